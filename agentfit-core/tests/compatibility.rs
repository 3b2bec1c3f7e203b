use agentfit_core::models::GIB;
use agentfit_core::{
    CatalogModel, CompatibilityStatus, EvaluationParameters, MemoryReading, ModelCatalog,
    ModelCompatibility, evaluate, evaluate_model,
};

const GB: f64 = GIB as f64;

fn find_model(catalog: &ModelCatalog, id: &str) -> CatalogModel {
    catalog
        .get(id)
        .unwrap_or_else(|| panic!("model {id} not found in catalog"))
        .clone()
}

fn eval_single(
    model: &CatalogModel,
    total_gb: f64,
    free_gb: f64,
    agents: f64,
    context_length: u32,
) -> ModelCompatibility {
    let memory = MemoryReading::new((total_gb * GB) as u64, (free_gb * GB) as u64);
    evaluate_model(
        model,
        &memory,
        &EvaluationParameters::new(agents, context_length),
    )
}

#[test]
fn phi3_mini_is_ok_on_36gb_machine() {
    let catalog = ModelCatalog::new();
    let result = eval_single(&find_model(&catalog, "phi-3-mini"), 36.0, 18.4, 1.0, 4096);
    assert_eq!(result.status, CompatibilityStatus::Ok);
    assert!(result.headroom_bytes >= 2.0 * GB);
    assert!((result.headroom_bytes - 15.4 * GB).abs() < 1.0);
}

#[test]
fn model_405b_is_ng_on_36gb_machine() {
    let catalog = ModelCatalog::new();
    let result = eval_single(&find_model(&catalog, "llama-3.1-405b"), 36.0, 18.4, 1.0, 4096);
    assert_eq!(result.status, CompatibilityStatus::Ng);
    assert!(result.headroom_bytes < 0.0);
}

#[test]
fn more_parallel_agents_shrink_headroom() {
    let catalog = ModelCatalog::new();
    let llama8b = find_model(&catalog, "llama-3.2-8b");

    let one = eval_single(&llama8b, 36.0, 18.4, 1.0, 4096);
    let three = eval_single(&llama8b, 36.0, 18.4, 3.0, 4096);
    let five = eval_single(&llama8b, 36.0, 18.4, 5.0, 4096);

    assert!(one.headroom_bytes > three.headroom_bytes);
    assert!(three.headroom_bytes > five.headroom_bytes);
    // 0.3 x 6 GiB per extra agent
    assert!((one.headroom_bytes - three.headroom_bytes - 3.6 * GB).abs() < 1.0);
}

#[test]
fn longer_context_shrinks_headroom() {
    let catalog = ModelCatalog::new();
    let llama8b = find_model(&catalog, "llama-3.2-8b");

    let ctx2k = eval_single(&llama8b, 36.0, 18.4, 1.0, 2048);
    let ctx8k = eval_single(&llama8b, 36.0, 18.4, 1.0, 8192);

    assert!(ctx2k.headroom_bytes > ctx8k.headroom_bytes);
    assert_eq!(ctx2k.required_ram_bytes, 6.0 * GB);
    assert!((ctx8k.required_ram_bytes - 6.0 * GB * 1.15).abs() < 1.0);
}

#[test]
fn machine_16gb_patterns() {
    let catalog = ModelCatalog::new();
    let (total, free) = (16.0, 8.0);

    let phi = eval_single(&find_model(&catalog, "phi-3-mini"), total, free, 1.0, 4096);
    assert_eq!(phi.status, CompatibilityStatus::Ok);

    let mistral = eval_single(&find_model(&catalog, "mistral-7b"), total, free, 1.0, 4096);
    assert!(mistral.status.is_runnable());

    let gemma = eval_single(&find_model(&catalog, "gemma-2-27b"), total, free, 1.0, 4096);
    assert_eq!(gemma.status, CompatibilityStatus::Ng);
}

#[test]
fn machine_64gb_patterns() {
    let catalog = ModelCatalog::new();

    // 42 GiB required, 40 GiB free
    let llama70b = eval_single(&find_model(&catalog, "llama-3.3-70b"), 64.0, 40.0, 1.0, 4096);
    assert_eq!(llama70b.status, CompatibilityStatus::Ng);
    assert_eq!(llama70b.headroom_bytes, -2.0 * GB);

    let gemma = eval_single(&find_model(&catalog, "gemma-2-27b"), 64.0, 40.0, 1.0, 4096);
    assert_eq!(gemma.status, CompatibilityStatus::Ok);
}

#[test]
fn machine_128gb_patterns() {
    let catalog = ModelCatalog::new();

    let llama70b = eval_single(&find_model(&catalog, "llama-3.3-70b"), 128.0, 80.0, 1.0, 4096);
    assert_eq!(llama70b.status, CompatibilityStatus::Ok);
    assert_eq!(llama70b.headroom_bytes, 38.0 * GB);

    let huge = eval_single(&find_model(&catalog, "llama-3.1-405b"), 128.0, 80.0, 1.0, 4096);
    assert_eq!(huge.status, CompatibilityStatus::Ng);
}

#[test]
fn whole_catalog_evaluates_in_order() {
    let catalog = ModelCatalog::new();
    let memory = MemoryReading::new(36 * GIB, (18.4 * GB) as u64);
    let results = evaluate(catalog.models(), &memory, &EvaluationParameters::default());

    assert_eq!(results.len(), catalog.len());
    for (result, model) in results.iter().zip(catalog.models()) {
        assert_eq!(&result.model, model);
        assert!(result.headroom_bytes.is_finite());
    }
}

#[test]
fn clamped_agent_counts_match() {
    let catalog = ModelCatalog::new();
    let phi = find_model(&catalog, "phi-3-mini");

    let negative = eval_single(&phi, 36.0, 18.4, -5.0, 4096);
    let one = eval_single(&phi, 36.0, 18.4, 1.0, 4096);
    assert_eq!(negative.headroom_bytes, one.headroom_bytes);

    let fifteen = eval_single(&phi, 36.0, 18.4, 15.0, 4096);
    let ten = eval_single(&phi, 36.0, 18.4, 10.0, 4096);
    assert_eq!(fifteen.headroom_bytes, ten.headroom_bytes);
}

#[test]
fn baseline_context_leaves_requirement_untouched() {
    let catalog = ModelCatalog::new();
    let memory = MemoryReading::new(36 * GIB, 18 * GIB);
    for ctx in [1, 2048, 4096] {
        let results = evaluate(catalog.models(), &memory, &EvaluationParameters::new(1.0, ctx));
        for r in &results {
            assert_eq!(r.required_ram_bytes, r.model.base_required_ram_bytes as f64);
        }
    }
}
