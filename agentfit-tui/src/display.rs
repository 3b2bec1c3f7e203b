use agentfit_core::format::{
    bytes_to_gb, format_bytes, format_context, format_context_options, format_headroom, round1,
    round2,
};
use agentfit_core::{
    CatalogModel, CompatibilityStatus, DynamicSystemInfo, EvaluationParameters, MemoryReading,
    ModelCatalog, ModelCompatibility, StaticSystemInfo, StatusCounts, context_length_multiplier,
    max_parallel_agents,
};
use colored::*;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Quant")]
    quant: String,
    #[tabled(rename = "Base RAM")]
    ram: String,
    #[tabled(rename = "Disk")]
    disk: String,
    #[tabled(rename = "Context")]
    context: String,
}

#[derive(Tabled)]
struct CompatibilityRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Quant")]
    quant: String,
    #[tabled(rename = "Needs")]
    required: String,
    #[tabled(rename = "Headroom")]
    headroom: String,
    #[tabled(rename = "Disk")]
    disk: String,
    #[tabled(rename = "Context")]
    context: String,
}

fn colored_label(status: CompatibilityStatus) -> ColoredString {
    match status {
        CompatibilityStatus::Ok => status.label().green(),
        CompatibilityStatus::Heavy => status.label().yellow(),
        CompatibilityStatus::Ng => status.label().red(),
    }
}

fn agents_text(agents: u32) -> String {
    if agents == 1 {
        "1 agent".to_string()
    } else {
        format!("{agents} agents")
    }
}

pub fn display_system(system: &StaticSystemInfo, dynamic: &DynamicSystemInfo, memory: &MemoryReading) {
    println!("\n{}", "=== System ===".bold().cyan());
    println!("{}: {}", "CPU".bold(), system.cpu_model);
    if let Some(chip) = &system.chip {
        println!("{}: {}", "Chip".bold(), chip);
    }
    println!("{}: {}", "Cores".bold(), system.cpu_cores);
    if let Some(gpu_cores) = system.gpu_cores {
        println!("{}: {}", "GPU cores".bold(), gpu_cores);
    }
    println!("{}: {}", "Architecture".bold(), system.architecture);
    println!("{}: {}", "OS".bold(), system.os_version);
    println!(
        "{}: {} free / {} total",
        "RAM".bold(),
        format_bytes(memory.free_ram_bytes as f64).cyan(),
        format_bytes(memory.total_ram_bytes as f64)
    );
    let pressure = dynamic.memory_pressure.label();
    let pressure = match dynamic.memory_pressure {
        agentfit_core::MemoryPressure::Nominal => pressure.green(),
        agentfit_core::MemoryPressure::Warning => pressure.yellow(),
        agentfit_core::MemoryPressure::Critical => pressure.red(),
    };
    println!("{}: {}", "Memory Pressure".bold(), pressure);
    println!("{}: {:.1}%", "CPU Load".bold(), dynamic.cpu_load_percent);
    println!(
        "{}: {} free / {} total",
        "Disk".bold(),
        format_bytes(dynamic.disk_free_bytes as f64),
        format_bytes(system.disk_total_bytes as f64)
    );
    println!();
}

pub fn display_catalog(catalog: &ModelCatalog) {
    let models = catalog.models();
    println!("\n{}", "=== Model Catalog ===".bold().cyan());
    println!(
        "Total models: {} ({})\n",
        models.len(),
        catalog.families().join(", ")
    );

    let rows: Vec<CatalogRow> = models
        .iter()
        .map(|m| CatalogRow {
            id: m.id.clone(),
            name: m.name.clone(),
            family: m.family.clone(),
            size: m.parameter_size.clone(),
            quant: m.quantization.clone(),
            ram: format_bytes(m.base_required_ram_bytes as f64),
            disk: format_bytes(m.disk_size_bytes as f64),
            context: format_context_options(&m.context_length_options),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_compatibility(results: &[ModelCompatibility], params: &EvaluationParameters) {
    println!(
        "\n{}",
        format!(
            "=== Compatibility: {} at {} context ===",
            agents_text(params.clamped_agents()),
            format_context(params.context_length)
        )
        .bold()
        .cyan()
    );

    if results.is_empty() {
        println!("\n{}", "No models match.".yellow());
        return;
    }

    let counts = StatusCounts::tally(results);
    println!(
        "{} OK, {} Heavy, {} Not Recommended\n",
        counts.ok.to_string().green(),
        counts.heavy.to_string().yellow(),
        counts.ng.to_string().red()
    );

    let rows: Vec<CompatibilityRow> = results
        .iter()
        .map(|r| CompatibilityRow {
            status: format!("{} {}", r.status.emoji(), r.status.label()),
            name: r.model.name.clone(),
            family: r.model.family.clone(),
            size: r.model.parameter_size.clone(),
            quant: r.model.quantization.clone(),
            required: format_bytes(r.required_ram_bytes),
            headroom: format_headroom(r.headroom_bytes),
            disk: format_bytes(r.model.disk_size_bytes as f64),
            context: format_context_options(&r.model.context_length_options),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_model_detail(
    result: &ModelCompatibility,
    memory: &MemoryReading,
    params: &EvaluationParameters,
) {
    let model = &result.model;
    let agents = params.clamped_agents();
    let ctx = params.context_length;

    println!("\n{}", format!("=== {} ===", model.name).bold().cyan());
    println!();
    println!("{}: {}", "Id".bold(), model.id);
    println!("{}: {}", "Family".bold(), model.family);
    println!("{}: {}", "Parameters".bold(), model.parameter_size);
    println!("{}: {}", "Quantization".bold(), model.quantization);
    println!(
        "{}: {}",
        "Disk Size".bold(),
        format_bytes(model.disk_size_bytes as f64)
    );
    println!(
        "{}: {}",
        "Context Options".bold(),
        format_context_options(&model.context_length_options)
    );
    if !model.description.is_empty() {
        println!("{}: {}", "Description".bold(), model.description);
    }
    println!();

    println!(
        "{}",
        format!(
            "Sizing ({}, {} context):",
            agents_text(agents),
            format_context(ctx)
        )
        .bold()
        .underline()
    );
    println!(
        "  Base requirement:    {} (at 4k)",
        format_bytes(model.base_required_ram_bytes as f64)
    );
    println!(
        "  Context multiplier:  x{:.2}",
        context_length_multiplier(ctx)
    );
    println!("  Per instance:        {}", format_bytes(result.required_ram_bytes));
    println!(
        "  Free RAM:            {}",
        format_bytes(memory.free_ram_bytes as f64)
    );
    println!(
        "  Parallel overhead:   {} ({} extra x 30%)",
        format_bytes(result.parallel_overhead_bytes(memory.free_ram_bytes)),
        agents - 1
    );
    println!(
        "  Effective available: {}",
        format_bytes(result.effective_available_bytes.max(0.0))
    );
    println!("  Headroom:            {}", format_headroom(result.headroom_bytes));
    println!();

    println!(
        "{}: {} {}",
        "Verdict".bold(),
        result.status.emoji(),
        colored_label(result.status)
    );
    match max_parallel_agents(model, memory, ctx) {
        Some(n) => println!("{}: {}", "Max Parallel Agents".bold(), n),
        None => println!(
            "{}: none, a single instance does not fit",
            "Max Parallel Agents".bold()
        ),
    }
    if !model.supports_context(ctx) {
        println!(
            "{}",
            format!(
                "Note: {} context is not among this model's listed options.",
                format_context(ctx)
            )
            .yellow()
        );
    }
    println!();
}

// ────────────────────────────────────────────────────────────────────
// JSON output for machine consumption
// ────────────────────────────────────────────────────────────────────

fn print_json(value: &serde_json::Value, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

pub fn display_json_system(
    system: &StaticSystemInfo,
    dynamic: &DynamicSystemInfo,
    memory: &MemoryReading,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "system": system_json(system, dynamic, memory),
    });
    print_json(&output, true)
}

pub fn display_json_catalog(models: &[CatalogModel]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "models": models.iter().map(catalog_model_json).collect::<Vec<_>>(),
    });
    print_json(&output, true)
}

/// `pretty = false` emits one line per call, for `watch`.
pub fn display_json_results(
    system: &StaticSystemInfo,
    dynamic: &DynamicSystemInfo,
    memory: &MemoryReading,
    params: &EvaluationParameters,
    results: &[ModelCompatibility],
    pretty: bool,
) -> anyhow::Result<()> {
    let output = results_json(system, dynamic, memory, params, results);
    print_json(&output, pretty)
}

fn results_json(
    system: &StaticSystemInfo,
    dynamic: &DynamicSystemInfo,
    memory: &MemoryReading,
    params: &EvaluationParameters,
    results: &[ModelCompatibility],
) -> serde_json::Value {
    let models: Vec<serde_json::Value> = results
        .iter()
        .map(|r| compatibility_json(r, memory, params))
        .collect();
    serde_json::json!({
        "system": system_json(system, dynamic, memory),
        "parameters": {
            "parallel_agents": params.clamped_agents(),
            "context_length": params.context_length,
            "context_multiplier": round2(context_length_multiplier(params.context_length)),
        },
        "models": models,
    })
}

fn system_json(
    system: &StaticSystemInfo,
    dynamic: &DynamicSystemInfo,
    memory: &MemoryReading,
) -> serde_json::Value {
    serde_json::json!({
        "cpu_model": system.cpu_model,
        "chip": system.chip,
        "cpu_cores": system.cpu_cores,
        "gpu_cores": system.gpu_cores,
        "architecture": system.architecture,
        "os_version": system.os_version,
        "total_ram_bytes": memory.total_ram_bytes,
        "free_ram_bytes": memory.free_ram_bytes,
        "used_ram_bytes": memory.used_ram_bytes(),
        "total_ram_gb": round2(memory.total_ram_gb()),
        "free_ram_gb": round2(memory.free_ram_gb()),
        "memory_pressure": dynamic.memory_pressure,
        "cpu_load_percent": round1(dynamic.cpu_load_percent),
        "disk_total_gb": round2(bytes_to_gb(system.disk_total_bytes as f64)),
        "disk_free_gb": round2(bytes_to_gb(dynamic.disk_free_bytes as f64)),
        "timestamp": dynamic.timestamp,
    })
}

fn catalog_model_json(model: &CatalogModel) -> serde_json::Value {
    serde_json::json!({
        "id": model.id,
        "name": model.name,
        "family": model.family,
        "parameter_size": model.parameter_size,
        "quantization": model.quantization,
        "base_required_ram_bytes": model.base_required_ram_bytes,
        "base_required_ram_gb": round2(model.base_required_ram_gb()),
        "disk_size_gb": round2(bytes_to_gb(model.disk_size_bytes as f64)),
        "context_length_options": model.context_length_options,
        "description": model.description,
    })
}

fn compatibility_json(
    result: &ModelCompatibility,
    memory: &MemoryReading,
    params: &EvaluationParameters,
) -> serde_json::Value {
    let mut value = catalog_model_json(&result.model);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("status".into(), serde_json::json!(result.status));
        obj.insert("status_label".into(), serde_json::json!(result.status.label()));
        obj.insert(
            "required_ram_bytes".into(),
            serde_json::json!(result.required_ram_bytes.round() as u64),
        );
        obj.insert(
            "required_ram_gb".into(),
            serde_json::json!(round2(bytes_to_gb(result.required_ram_bytes))),
        );
        obj.insert(
            "effective_available_gb".into(),
            serde_json::json!(round2(bytes_to_gb(result.effective_available_bytes))),
        );
        obj.insert(
            "headroom_bytes".into(),
            serde_json::json!(result.headroom_bytes.round() as i64),
        );
        obj.insert(
            "headroom_gb".into(),
            serde_json::json!(round2(bytes_to_gb(result.headroom_bytes))),
        );
        obj.insert(
            "supports_context".into(),
            serde_json::json!(result.model.supports_context(params.context_length)),
        );
        obj.insert(
            "max_parallel_agents".into(),
            serde_json::json!(max_parallel_agents(
                &result.model,
                memory,
                params.context_length
            )),
        );
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentfit_core::models::GIB;
    use agentfit_core::evaluate;

    #[test]
    fn test_results_json_shape() {
        let catalog = ModelCatalog::new();
        let system = StaticSystemInfo::demo();
        let dynamic = DynamicSystemInfo::demo();
        let memory = MemoryReading::from_info(&system, &dynamic);
        let params = EvaluationParameters::new(3.0, 8192);
        let results = evaluate(catalog.models(), &memory, &params);

        let json = results_json(&system, &dynamic, &memory, &params, &results);

        assert_eq!(json["parameters"]["parallel_agents"], 3);
        assert_eq!(json["parameters"]["context_length"], 8192);
        assert_eq!(json["parameters"]["context_multiplier"], 1.15);
        assert_eq!(json["system"]["total_ram_bytes"], 36 * GIB);
        assert_eq!(json["system"]["memory_pressure"], "nominal");
        assert_eq!(json["system"]["gpu_cores"], 18);

        let models = json["models"].as_array().unwrap();
        assert_eq!(models.len(), catalog.len());
        let phi = models.iter().find(|m| m["id"] == "phi-3-mini").unwrap();
        assert_eq!(phi["status"], "ok");
        assert_eq!(phi["status_label"], "OK");
        assert_eq!(phi["supports_context"], false);
        let huge = models.iter().find(|m| m["id"] == "llama-3.1-405b").unwrap();
        assert_eq!(huge["status"], "ng");
        assert!(huge["headroom_gb"].as_f64().unwrap() < 0.0);
        assert!(huge["max_parallel_agents"].is_null());
    }

    #[test]
    fn test_agents_text() {
        assert_eq!(agents_text(1), "1 agent");
        assert_eq!(agents_text(4), "4 agents");
    }
}
