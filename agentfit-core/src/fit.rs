use crate::hardware::MemoryReading;
use crate::models::{CatalogModel, DEFAULT_CONTEXT_LENGTH, GIB};

/// Headroom at or above this is comfortable.
pub const TWO_GIB: f64 = 2.0 * GIB as f64;

pub const MIN_PARALLEL_AGENTS: u32 = 1;
pub const MAX_PARALLEL_AGENTS: u32 = 10;

/// Share of one instance's adjusted RAM each extra agent consumes.
const PARALLEL_AGENT_OVERHEAD: f64 = 0.3;

/// RAM growth per doubling of context beyond the 4096-token baseline.
const CONTEXT_DOUBLING_OVERHEAD: f64 = 0.15;

/// Compatibility verdict for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityStatus {
    Ok,    // at least 2 GiB of headroom
    Heavy, // fits, but with less than 2 GiB to spare
    Ng,    // not recommended: insufficient RAM
}

impl CompatibilityStatus {
    pub fn from_headroom(headroom_bytes: f64) -> Self {
        if headroom_bytes >= TWO_GIB {
            CompatibilityStatus::Ok
        } else if headroom_bytes >= 0.0 {
            CompatibilityStatus::Heavy
        } else {
            CompatibilityStatus::Ng
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompatibilityStatus::Ok => "OK",
            CompatibilityStatus::Heavy => "Heavy",
            CompatibilityStatus::Ng => "Not Recommended",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CompatibilityStatus::Ok => "ok",
            CompatibilityStatus::Heavy => "heavy",
            CompatibilityStatus::Ng => "ng",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            CompatibilityStatus::Ok => "🟢",
            CompatibilityStatus::Heavy => "🟡",
            CompatibilityStatus::Ng => "🔴",
        }
    }

    pub fn is_runnable(&self) -> bool {
        *self != CompatibilityStatus::Ng
    }

    fn rank(&self) -> u8 {
        match self {
            CompatibilityStatus::Ok => 0,
            CompatibilityStatus::Heavy => 1,
            CompatibilityStatus::Ng => 2,
        }
    }
}

impl std::str::FromStr for CompatibilityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" => Ok(CompatibilityStatus::Ok),
            "heavy" => Ok(CompatibilityStatus::Heavy),
            "ng" | "not-recommended" | "not_recommended" => Ok(CompatibilityStatus::Ng),
            other => Err(format!("unknown status '{other}' (expected ok, heavy or ng)")),
        }
    }
}

/// User-chosen usage parameters. `parallel_agents` is kept raw here and
/// normalised by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EvaluationParameters {
    pub parallel_agents: f64,
    pub context_length: u32,
}

impl Default for EvaluationParameters {
    fn default() -> Self {
        EvaluationParameters {
            parallel_agents: 1.0,
            context_length: DEFAULT_CONTEXT_LENGTH,
        }
    }
}

impl EvaluationParameters {
    pub fn new(parallel_agents: f64, context_length: u32) -> Self {
        EvaluationParameters {
            parallel_agents,
            context_length,
        }
    }

    pub fn clamped_agents(&self) -> u32 {
        clamp_parallel_agents(self.parallel_agents)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelCompatibility {
    pub model: CatalogModel,
    pub status: CompatibilityStatus,
    /// Context-adjusted requirement for a single instance.
    pub required_ram_bytes: f64,
    /// Free RAM left after the extra agents' overhead.
    pub effective_available_bytes: f64,
    /// `effective_available_bytes - required_ram_bytes`; negative is a deficit.
    pub headroom_bytes: f64,
}

impl ModelCompatibility {
    pub fn parallel_overhead_bytes(&self, free_ram_bytes: u64) -> f64 {
        free_ram_bytes as f64 - self.effective_available_bytes
    }
}

pub fn context_length_multiplier(context_length: u32) -> f64 {
    if context_length <= DEFAULT_CONTEXT_LENGTH {
        return 1.0;
    }
    let doublings = (context_length as f64 / DEFAULT_CONTEXT_LENGTH as f64).log2();
    1.0 + doublings * CONTEXT_DOUBLING_OVERHEAD
}

/// Round to the nearest whole agent and clamp to 1..=10. Never fails; NaN
/// counts as a single agent.
pub fn clamp_parallel_agents(raw: f64) -> u32 {
    if raw.is_nan() {
        return MIN_PARALLEL_AGENTS;
    }
    raw.round()
        .clamp(MIN_PARALLEL_AGENTS as f64, MAX_PARALLEL_AGENTS as f64) as u32
}

pub fn evaluate_model(
    model: &CatalogModel,
    memory: &MemoryReading,
    params: &EvaluationParameters,
) -> ModelCompatibility {
    let agents = params.clamped_agents();
    let ctx_multiplier = context_length_multiplier(params.context_length);
    let adjusted_ram = model.base_required_ram_bytes as f64 * ctx_multiplier;

    let parallel_overhead = (agents - 1) as f64 * adjusted_ram * PARALLEL_AGENT_OVERHEAD;
    let effective_available_bytes = memory.free_ram_bytes as f64 - parallel_overhead;
    let headroom_bytes = effective_available_bytes - adjusted_ram;

    ModelCompatibility {
        model: model.clone(),
        status: CompatibilityStatus::from_headroom(headroom_bytes),
        required_ram_bytes: adjusted_ram,
        effective_available_bytes,
        headroom_bytes,
    }
}

/// Evaluate every model against the current memory reading. Output order
/// matches `models`. `memory.total_ram_bytes` does not enter the math.
pub fn evaluate(
    models: &[CatalogModel],
    memory: &MemoryReading,
    params: &EvaluationParameters,
) -> Vec<ModelCompatibility> {
    models
        .iter()
        .map(|m| evaluate_model(m, memory, params))
        .collect()
}

/// Largest agent count (1..=10) that still isn't `Ng` for this model.
pub fn max_parallel_agents(
    model: &CatalogModel,
    memory: &MemoryReading,
    context_length: u32,
) -> Option<u32> {
    (MIN_PARALLEL_AGENTS..=MAX_PARALLEL_AGENTS)
        .rev()
        .find(|&agents| {
            let params = EvaluationParameters::new(agents as f64, context_length);
            evaluate_model(model, memory, &params).status.is_runnable()
        })
}

/// Display ordering: ok before heavy before ng, most headroom first.
pub fn rank_by_headroom(mut results: Vec<ModelCompatibility>) -> Vec<ModelCompatibility> {
    results.sort_by(|a, b| {
        a.status.rank().cmp(&b.status.rank()).then_with(|| {
            b.headroom_bytes
                .partial_cmp(&a.headroom_bytes)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    results
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub ok: usize,
    pub heavy: usize,
    pub ng: usize,
}

impl StatusCounts {
    pub fn tally(results: &[ModelCompatibility]) -> Self {
        let mut counts = StatusCounts::default();
        for r in results {
            match r.status {
                CompatibilityStatus::Ok => counts.ok += 1,
                CompatibilityStatus::Heavy => counts.heavy += 1,
                CompatibilityStatus::Ng => counts.ng += 1,
            }
        }
        counts
    }
}
