use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Context window the catalog's baseline RAM figures are measured at.
pub const DEFAULT_CONTEXT_LENGTH: u32 = 4096;

/// Context lengths offered by the front ends.
pub const STANDARD_CONTEXT_LENGTHS: &[u32] = &[2048, 4096, 8192, 16384, 32768];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub id: String,
    pub family: String,
    pub name: String,
    pub parameter_size: String,
    pub quantization: String,
    /// RAM needed to load one instance at the 4096-token reference context.
    pub base_required_ram_bytes: u64,
    pub disk_size_bytes: u64,
    pub context_length_options: Vec<u32>,
    #[serde(default)]
    pub description: String,
}

impl CatalogModel {
    pub fn supports_context(&self, context_length: u32) -> bool {
        self.context_length_options.contains(&context_length)
    }

    pub fn max_context_length(&self) -> u32 {
        self.context_length_options.iter().copied().max().unwrap_or(0)
    }

    pub fn base_required_ram_gb(&self) -> f64 {
        self.base_required_ram_bytes as f64 / GIB as f64
    }
}

/// On-disk catalog schema. Sizes are written in GiB for readability and
/// converted to bytes when mapped to `CatalogModel`.
#[derive(Deserialize)]
struct CatalogEntry {
    id: String,
    family: String,
    name: String,
    parameter_size: String,
    quantization: String,
    required_ram_gb: f64,
    disk_size_gb: f64,
    context_length_options: Vec<u32>,
    #[serde(default)]
    description: String,
}

const CATALOG_JSON: &str = include_str!("../data/catalog.json");

fn gb_to_bytes(gb: f64) -> u64 {
    (gb * GIB as f64).round() as u64
}

pub struct ModelCatalog {
    models: Vec<CatalogModel>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCatalog {
    /// The catalog compiled into the binary.
    pub fn new() -> Self {
        match Self::from_json_str(CATALOG_JSON) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("embedded model catalog is invalid: {e}");
                ModelCatalog { models: Vec::new() }
            }
        }
    }

    pub fn from_models(models: Vec<CatalogModel>) -> Self {
        ModelCatalog { models }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;

        let mut seen = BTreeSet::new();
        let mut models = Vec::with_capacity(entries.len());
        for e in entries {
            if !seen.insert(e.id.clone()) {
                return Err(Error::InvalidCatalog(format!("duplicate model id '{}'", e.id)));
            }
            if e.context_length_options.is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "model '{}' has no context length options",
                    e.id
                )));
            }
            if e.context_length_options.contains(&0) {
                return Err(Error::InvalidCatalog(format!(
                    "model '{}' lists a zero context length",
                    e.id
                )));
            }
            for (field, value) in [("required_ram_gb", e.required_ram_gb), ("disk_size_gb", e.disk_size_gb)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::InvalidCatalog(format!(
                        "model '{}' has invalid {field}: {value}",
                        e.id
                    )));
                }
            }

            let mut context_length_options = e.context_length_options;
            context_length_options.sort_unstable();
            context_length_options.dedup();

            models.push(CatalogModel {
                id: e.id,
                family: e.family,
                name: e.name,
                parameter_size: e.parameter_size,
                quantization: e.quantization,
                base_required_ram_bytes: gb_to_bytes(e.required_ram_gb),
                disk_size_bytes: gb_to_bytes(e.disk_size_gb),
                context_length_options,
                description: e.description,
            });
        }

        tracing::debug!(count = models.len(), "loaded model catalog");
        Ok(ModelCatalog { models })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn models(&self) -> &[CatalogModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogModel> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn find_model(&self, query: &str) -> Vec<&CatalogModel> {
        let query_lower = query.to_lowercase();
        self.models
            .iter()
            .filter(|m| {
                m.id.to_lowercase().contains(&query_lower)
                    || m.name.to_lowercase().contains(&query_lower)
                    || m.family.to_lowercase().contains(&query_lower)
                    || m.parameter_size.to_lowercase().contains(&query_lower)
            })
            .collect()
    }

    pub fn families(&self) -> Vec<String> {
        self.models
            .iter()
            .map(|m| m.family.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sorted union of every model's supported context lengths.
    pub fn context_length_options(&self) -> Vec<u32> {
        self.models
            .iter()
            .flat_map(|m| m.context_length_options.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_parses() {
        let catalog = ModelCatalog::from_json_str(CATALOG_JSON).expect("embedded catalog");
        assert_eq!(catalog.len(), 8);
        assert_eq!(ModelCatalog::new().len(), 8);
    }

    #[test]
    fn test_sizes_converted_to_bytes() {
        let catalog = ModelCatalog::new();
        let phi = catalog.get("phi-3-mini").unwrap();
        assert_eq!(phi.base_required_ram_bytes, 3 * GIB);

        let mistral = catalog.get("mistral-7b").unwrap();
        assert_eq!(mistral.base_required_ram_bytes, 11 * GIB / 2);
        assert_eq!(mistral.base_required_ram_gb(), 5.5);
    }

    #[test]
    fn test_catalog_preserves_file_order() {
        let catalog = ModelCatalog::new();
        let ids: Vec<&str> = catalog.models().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"llama-3.2-8b"));
        assert_eq!(ids.last(), Some(&"qwen-2.5-72b"));
    }

    #[test]
    fn test_find_model() {
        let catalog = ModelCatalog::new();

        let llamas = catalog.find_model("llama");
        assert_eq!(llamas.len(), 3);

        let by_size = catalog.find_model("72B");
        assert_eq!(by_size.len(), 1);
        assert_eq!(by_size[0].id, "qwen-2.5-72b");

        assert!(catalog.find_model("nonexistent").is_empty());
    }

    #[test]
    fn test_families_sorted_unique() {
        let catalog = ModelCatalog::new();
        assert_eq!(
            catalog.families(),
            vec!["Gemma", "Llama", "Mistral", "Phi", "Qwen"]
        );
    }

    #[test]
    fn test_context_length_options_union() {
        let catalog = ModelCatalog::new();
        assert_eq!(
            catalog.context_length_options(),
            STANDARD_CONTEXT_LENGTHS.to_vec()
        );

        let phi = catalog.get("phi-3-mini").unwrap();
        assert!(phi.supports_context(4096));
        assert!(!phi.supports_context(8192));
        assert_eq!(phi.max_context_length(), 4096);
    }

    // ────────────────────────────────────────────────────────────────────
    // Validation
    // ────────────────────────────────────────────────────────────────────

    fn entry(id: &str, ctx: &str) -> String {
        format!(
            r#"{{"id":"{id}","family":"F","name":"N","parameter_size":"1B","quantization":"Q4_K_M","required_ram_gb":1.0,"disk_size_gb":1.0,"context_length_options":{ctx}}}"#
        )
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let json = format!("[{},{}]", entry("a", "[4096]"), entry("a", "[2048]"));
        let err = ModelCatalog::from_json_str(&json).err().unwrap();
        assert!(matches!(err, Error::InvalidCatalog(_)));
    }

    #[test]
    fn test_rejects_empty_context_options() {
        let json = format!("[{}]", entry("a", "[]"));
        assert!(ModelCatalog::from_json_str(&json).is_err());

        let json = format!("[{}]", entry("a", "[0, 4096]"));
        assert!(ModelCatalog::from_json_str(&json).is_err());
    }

    #[test]
    fn test_rejects_negative_sizes() {
        let json = r#"[{"id":"a","family":"F","name":"N","parameter_size":"1B","quantization":"Q4_K_M","required_ram_gb":-1.0,"disk_size_gb":1.0,"context_length_options":[4096]}]"#;
        assert!(ModelCatalog::from_json_str(json).is_err());
    }

    #[test]
    fn test_context_options_sorted_and_deduped() {
        let json = format!("[{}]", entry("a", "[8192, 2048, 8192]"));
        let catalog = ModelCatalog::from_json_str(&json).unwrap();
        assert_eq!(catalog.models()[0].context_length_options, vec![2048, 8192]);
        assert_eq!(catalog.models()[0].description, "");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, format!("[{}]", entry("custom", "[4096]"))).unwrap();

        let catalog = ModelCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("custom").is_some());

        let missing = ModelCatalog::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
