use agentfit_core::fit::{MAX_PARALLEL_AGENTS, MIN_PARALLEL_AGENTS};
use agentfit_core::models::STANDARD_CONTEXT_LENGTHS;
use agentfit_core::{
    CompatibilityStatus, DynamicSystemInfo, EvaluationParameters, MemoryMonitor, MemoryOverrides,
    MemoryReading, ModelCatalog, ModelCompatibility, StaticSystemInfo, StatusCounts, evaluate,
    rank_by_headroom,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFilter {
    All,
    Runnable, // Ok + Heavy
    Ok,
    Heavy,
    Ng,
}

impl StatusFilter {
    pub fn label(&self) -> &str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Runnable => "Runnable",
            StatusFilter::Ok => "OK",
            StatusFilter::Heavy => "Heavy",
            StatusFilter::Ng => "Not Recommended",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Runnable,
            StatusFilter::Runnable => StatusFilter::Ok,
            StatusFilter::Ok => StatusFilter::Heavy,
            StatusFilter::Heavy => StatusFilter::Ng,
            StatusFilter::Ng => StatusFilter::All,
        }
    }

    pub fn matches(&self, status: CompatibilityStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Runnable => status.is_runnable(),
            StatusFilter::Ok => status == CompatibilityStatus::Ok,
            StatusFilter::Heavy => status == CompatibilityStatus::Heavy,
            StatusFilter::Ng => status == CompatibilityStatus::Ng,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Catalog,
    Headroom,
}

impl SortOrder {
    pub fn label(&self) -> &str {
        match self {
            SortOrder::Catalog => "Catalog",
            SortOrder::Headroom => "Headroom",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SortOrder::Catalog => SortOrder::Headroom,
            SortOrder::Headroom => SortOrder::Catalog,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub search_query: String,
    pub cursor_position: usize,

    // Data
    pub catalog: ModelCatalog,
    pub system: StaticSystemInfo,
    pub dynamic: DynamicSystemInfo,
    pub memory: MemoryReading,
    overrides: MemoryOverrides,
    pub params: EvaluationParameters,
    pub results: Vec<ModelCompatibility>,
    pub filtered: Vec<usize>, // indices into results
    pub demo: bool,

    // Filters
    pub status_filter: StatusFilter,
    pub sort_order: SortOrder,

    // Table state
    pub selected_row: usize,

    // Detail view
    pub show_detail: bool,

    monitor: Option<MemoryMonitor>,
}

impl App {
    pub fn new(
        catalog: ModelCatalog,
        system: StaticSystemInfo,
        dynamic: DynamicSystemInfo,
        overrides: MemoryOverrides,
        params: EvaluationParameters,
    ) -> Self {
        let memory = overrides.apply(MemoryReading::from_info(&system, &dynamic));
        let mut app = App {
            should_quit: false,
            input_mode: InputMode::Normal,
            search_query: String::new(),
            cursor_position: 0,
            catalog,
            system,
            dynamic,
            memory,
            overrides,
            params,
            results: Vec::new(),
            filtered: Vec::new(),
            demo: false,
            status_filter: StatusFilter::All,
            sort_order: SortOrder::Catalog,
            selected_row: 0,
            show_detail: false,
            monitor: None,
        };
        app.refresh();
        app
    }

    /// Feed free-RAM samples from `monitor` on every tick.
    pub fn with_monitor(mut self, monitor: MemoryMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    /// Pick up the newest monitor sample, if one arrived.
    pub fn tick(&mut self) {
        let latest = self.monitor.as_ref().and_then(|m| m.try_latest());
        if let Some(sample) = latest {
            self.apply_sample(sample);
        }
    }

    pub fn apply_sample(&mut self, sample: DynamicSystemInfo) {
        self.dynamic = sample;
        self.memory = self
            .overrides
            .apply(MemoryReading::from_info(&self.system, &self.dynamic));
        self.refresh();
    }

    /// Re-evaluate every model, keeping the selected model selected.
    pub fn refresh(&mut self) {
        let selected_id = self.selected().map(|r| r.model.id.clone());

        let results = evaluate(self.catalog.models(), &self.memory, &self.params);
        self.results = match self.sort_order {
            SortOrder::Catalog => results,
            SortOrder::Headroom => rank_by_headroom(results),
        };
        self.apply_filters();

        if let Some(id) = selected_id
            && let Some(row) = self
                .filtered
                .iter()
                .position(|&idx| self.results[idx].model.id == id)
        {
            self.selected_row = row;
        }
    }

    pub fn apply_filters(&mut self) {
        let query = self.search_query.to_lowercase();
        let terms: Vec<&str> = query.split_whitespace().collect();

        self.filtered = self
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                let matches_search = terms.is_empty() || {
                    let searchable = format!(
                        "{} {} {} {} {}",
                        r.model.id, r.model.name, r.model.family, r.model.parameter_size,
                        r.model.quantization
                    )
                    .to_lowercase();
                    terms.iter().all(|term| searchable.contains(term))
                };
                matches_search && self.status_filter.matches(r.status)
            })
            .map(|(i, _)| i)
            .collect();

        if self.filtered.is_empty() {
            self.selected_row = 0;
        } else if self.selected_row >= self.filtered.len() {
            self.selected_row = self.filtered.len() - 1;
        }
    }

    pub fn selected(&self) -> Option<&ModelCompatibility> {
        self.filtered
            .get(self.selected_row)
            .map(|&idx| &self.results[idx])
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.results)
    }

    // ── Parameters ──────────────────────────────────────────────────────

    pub fn agents(&self) -> u32 {
        self.params.clamped_agents()
    }

    pub fn increase_agents(&mut self) {
        let agents = self.agents();
        if agents < MAX_PARALLEL_AGENTS {
            self.params.parallel_agents = (agents + 1) as f64;
            self.refresh();
        }
    }

    pub fn decrease_agents(&mut self) {
        let agents = self.agents();
        if agents > MIN_PARALLEL_AGENTS {
            self.params.parallel_agents = (agents - 1) as f64;
            self.refresh();
        }
    }

    /// Step to the next standard context length, wrapping around.
    pub fn next_context(&mut self) {
        let current = self.params.context_length;
        self.params.context_length = STANDARD_CONTEXT_LENGTHS
            .iter()
            .copied()
            .find(|&c| c > current)
            .unwrap_or(STANDARD_CONTEXT_LENGTHS[0]);
        self.refresh();
    }

    pub fn prev_context(&mut self) {
        let current = self.params.context_length;
        self.params.context_length = STANDARD_CONTEXT_LENGTHS
            .iter()
            .rev()
            .copied()
            .find(|&c| c < current)
            .unwrap_or(STANDARD_CONTEXT_LENGTHS[STANDARD_CONTEXT_LENGTHS.len() - 1]);
        self.refresh();
    }

    // ── Navigation ──────────────────────────────────────────────────────

    pub fn move_up(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if !self.filtered.is_empty() && self.selected_row < self.filtered.len() - 1 {
            self.selected_row += 1;
        }
    }

    pub fn page_up(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(10);
    }

    pub fn page_down(&mut self) {
        if !self.filtered.is_empty() {
            self.selected_row = (self.selected_row + 10).min(self.filtered.len() - 1);
        }
    }

    pub fn home(&mut self) {
        self.selected_row = 0;
    }

    pub fn end(&mut self) {
        if !self.filtered.is_empty() {
            self.selected_row = self.filtered.len() - 1;
        }
    }

    pub fn cycle_status_filter(&mut self) {
        self.status_filter = self.status_filter.next();
        self.apply_filters();
    }

    pub fn cycle_sort_order(&mut self) {
        self.sort_order = self.sort_order.next();
        self.refresh();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    // ── Search ──────────────────────────────────────────────────────────

    pub fn enter_search(&mut self) {
        self.input_mode = InputMode::Search;
    }

    pub fn exit_search(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn search_input(&mut self, c: char) {
        self.search_query.insert(self.cursor_position, c);
        self.cursor_position += c.len_utf8();
        self.apply_filters();
    }

    pub fn search_backspace(&mut self) {
        if let Some(prev) = self.search_query[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
            self.search_query.remove(self.cursor_position);
            self.apply_filters();
        }
    }

    pub fn search_delete(&mut self) {
        if self.cursor_position < self.search_query.len() {
            self.search_query.remove(self.cursor_position);
            self.apply_filters();
        }
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
        self.cursor_position = 0;
        self.apply_filters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentfit_core::models::GIB;

    fn demo_app() -> App {
        App::new(
            ModelCatalog::new(),
            StaticSystemInfo::demo(),
            DynamicSystemInfo::demo(),
            MemoryOverrides::default(),
            EvaluationParameters::default(),
        )
    }

    fn sample_with_free(free: u64) -> DynamicSystemInfo {
        DynamicSystemInfo {
            free_ram_bytes: free,
            ..DynamicSystemInfo::demo()
        }
    }

    #[test]
    fn test_initial_state_evaluates_whole_catalog() {
        let app = demo_app();
        assert_eq!(app.results.len(), app.catalog.len());
        assert_eq!(app.filtered.len(), app.results.len());
        assert_eq!(app.results[0].model.id, "llama-3.2-8b");
        assert_eq!(app.agents(), 1);
    }

    #[test]
    fn test_agents_stay_in_range() {
        let mut app = demo_app();
        app.decrease_agents();
        assert_eq!(app.agents(), 1);
        for _ in 0..20 {
            app.increase_agents();
        }
        assert_eq!(app.agents(), 10);
    }

    #[test]
    fn test_more_agents_lower_headroom() {
        let mut app = demo_app();
        let before = app.results[0].headroom_bytes;
        app.increase_agents();
        assert!(app.results[0].headroom_bytes < before);
    }

    #[test]
    fn test_context_cycle_wraps() {
        let mut app = demo_app();
        assert_eq!(app.params.context_length, 4096);
        app.next_context();
        assert_eq!(app.params.context_length, 8192);
        app.next_context();
        app.next_context();
        assert_eq!(app.params.context_length, 32768);
        app.next_context();
        assert_eq!(app.params.context_length, 2048);
        app.prev_context();
        assert_eq!(app.params.context_length, 32768);
    }

    #[test]
    fn test_context_cycle_from_custom_length() {
        let mut app = demo_app();
        app.params.context_length = 6000;
        app.next_context();
        assert_eq!(app.params.context_length, 8192);
        app.params.context_length = 6000;
        app.prev_context();
        assert_eq!(app.params.context_length, 4096);
    }

    #[test]
    fn test_sample_updates_results() {
        let mut app = demo_app();
        app.apply_sample(sample_with_free(2 * GIB));
        assert_eq!(app.memory.free_ram_bytes, 2 * GIB);
        // Even Phi-3 Mini needs 3 GiB.
        assert!(
            app.results
                .iter()
                .all(|r| r.status == CompatibilityStatus::Ng)
        );
    }

    #[test]
    fn test_pinned_free_memory_survives_samples() {
        let overrides = MemoryOverrides {
            total_ram_bytes: None,
            free_ram_bytes: Some(40 * GIB),
        };
        let mut app = App::new(
            ModelCatalog::new(),
            StaticSystemInfo::demo(),
            DynamicSystemInfo::demo(),
            overrides,
            EvaluationParameters::default(),
        );
        // Clamped to the 36 GiB installed.
        assert_eq!(app.memory.free_ram_bytes, 36 * GIB);
        app.apply_sample(sample_with_free(GIB));
        assert_eq!(app.memory.free_ram_bytes, 36 * GIB);
    }

    #[test]
    fn test_status_filter() {
        let mut app = demo_app();
        app.status_filter = StatusFilter::Ng;
        app.apply_filters();
        assert!(!app.filtered.is_empty());
        assert!(
            app.filtered
                .iter()
                .all(|&i| app.results[i].status == CompatibilityStatus::Ng)
        );

        app.status_filter = StatusFilter::Runnable;
        app.apply_filters();
        assert!(app.filtered.iter().all(|&i| app.results[i].status.is_runnable()));
    }

    #[test]
    fn test_search_matches_all_terms() {
        let mut app = demo_app();
        for c in "qwen 72".chars() {
            app.search_input(c);
        }
        assert_eq!(app.filtered.len(), 1);
        assert_eq!(app.selected().unwrap().model.id, "qwen-2.5-72b");

        app.search_backspace();
        app.search_backspace();
        assert_eq!(app.filtered.len(), 2);

        app.clear_search();
        assert_eq!(app.filtered.len(), app.results.len());
    }

    #[test]
    fn test_sort_keeps_selection() {
        let mut app = demo_app();
        app.end();
        let id = app.selected().unwrap().model.id.clone();
        app.cycle_sort_order();
        assert_eq!(app.sort_order, SortOrder::Headroom);
        assert_eq!(app.selected().unwrap().model.id, id);
        // Runnable models come first once ranked.
        assert!(app.results[0].status.is_runnable());
    }

    #[test]
    fn test_navigation_bounds() {
        let mut app = demo_app();
        app.move_up();
        assert_eq!(app.selected_row, 0);
        app.page_down();
        assert_eq!(app.selected_row, app.filtered.len() - 1);
        app.move_down();
        assert_eq!(app.selected_row, app.filtered.len() - 1);
        app.home();
        assert_eq!(app.selected_row, 0);
    }

    #[test]
    fn test_tick_drains_monitor() {
        let monitor = MemoryMonitor::spawn_with(std::time::Duration::from_secs(60), || {
            sample_with_free(4 * GIB)
        });
        let mut app = demo_app().with_monitor(monitor);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while app.memory.free_ram_bytes != 4 * GIB && std::time::Instant::now() < deadline {
            app.tick();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(app.memory.free_ram_bytes, 4 * GIB);
    }
}
