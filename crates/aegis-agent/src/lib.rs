//! # Aegis Agentic-Loop Guard
//!
//! Per-step defense for multi-turn agent trajectories. Each iteration of an
//! agent loop feeds its intermediate output (a tool result or model
//! reasoning) through [`ChainGuard::guard_step`] before the next step runs.
//!
//! ## Threat Model
//!
//! Agent loops face compounding risks that single-shot scanning misses:
//!
//! - **Unbounded recursion** - an injected instruction keeps the loop
//!   spinning and the bill growing (step budget)
//! - **Slow-burn injection** - each step stays under the block threshold
//!   while the trajectory as a whole drifts adversarial (cumulative risk)
//! - **Late-session abuse** - a compromised step reaches for powerful
//!   tools it never needed before (privilege decay)
//!
//! ## Security Notes
//!
//! - The budget check runs BEFORE scanning: an exhausted budget refuses the
//!   step without spending scan work on it.
//! - Cumulative risk is monotonically non-decreasing; once the ceiling is
//!   crossed, every future step is denied.
//! - The allowed-tool set only ever shrinks. High-risk tools (file-write,
//!   network-egress, shell) are dropped on the first detected anomaly,
//!   even one below the block threshold.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use aegis_scanner::{InputScanner, Quarantined, ScanResult};

/// Configuration for [`ChainGuard`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Step budget when the caller passes no explicit maximum.
    pub default_max_steps: u32,
    /// Ceiling for the running sum of per-step scan scores.
    pub max_cumulative_risk: f64,
    /// Tools removed from the allowed set after the first anomaly.
    pub high_risk_tools: BTreeSet<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            default_max_steps: 16,
            max_cumulative_risk: 3.0,
            high_risk_tools: ["write_file", "delete_file", "shell", "exec", "send_email", "http_post", "fetch_url"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Per-step options passed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStepOptions {
    /// 1-based index of this step in the trajectory.
    pub step: u32,
    /// The tool set the agent started the session with.
    pub initial_tools: BTreeSet<String>,
    /// Overrides the configured step budget for this trajectory.
    #[serde(default)]
    pub max_steps: Option<u32>,
}

/// Result of guarding one chain step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStepResult {
    /// Whether the loop may continue with this output.
    pub safe: bool,
    /// True when the step budget refused the step (no scan was run).
    pub budget_exhausted: bool,
    /// Running sum of per-step scan scores.
    pub cumulative_risk: f64,
    /// The tool floor after privilege decay; only ever shrinks.
    pub allowed_tools: BTreeSet<String>,
    /// The scan result for this step, absent when the budget refused it.
    #[serde(skip)]
    pub scan: Option<ScanResult>,
}

/// Guard state for one agent trajectory.
///
/// Owned by one session; step state is cumulative and never resets short
/// of discarding the guard.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeSet;
/// use aegis_agent::{ChainConfig, ChainGuard, ChainStepOptions};
/// use aegis_scanner::{InputScanner, ScannerConfig};
///
/// let scanner = InputScanner::new(ScannerConfig::default());
/// let mut guard = ChainGuard::new(ChainConfig { default_max_steps: 3, ..ChainConfig::default() });
/// let tools: BTreeSet<String> = ["search".to_string()].into_iter().collect();
///
/// let result = guard.guard_step(&scanner, "intermediate tool result", &ChainStepOptions {
///     step: 1,
///     initial_tools: tools,
///     max_steps: None,
/// });
/// assert!(result.safe);
/// assert!(!result.budget_exhausted);
/// ```
#[derive(Debug)]
pub struct ChainGuard {
    config: ChainConfig,
    steps_seen: u32,
    cumulative_risk: f64,
    /// Current tool floor; `None` until the first step seeds it from
    /// `initial_tools`.
    allowed_tools: Option<BTreeSet<String>>,
    ceiling_hit: bool,
}

impl ChainGuard {
    /// Build a guard for one trajectory.
    #[must_use]
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            steps_seen: 0,
            cumulative_risk: 0.0,
            allowed_tools: None,
            ceiling_hit: false,
        }
    }

    /// Running sum of per-step scan scores.
    #[must_use]
    pub fn cumulative_risk(&self) -> f64 {
        self.cumulative_risk
    }

    /// Steps guarded so far (budget-refused steps included).
    #[must_use]
    pub fn steps_seen(&self) -> u32 {
        self.steps_seen
    }

    /// Guard one loop iteration.
    ///
    /// `output` is the tool result or model reasoning about to be fed back
    /// into the next step; it is treated as untrusted quarantined text.
    pub fn guard_step(
        &mut self,
        scanner: &InputScanner,
        output: &str,
        opts: &ChainStepOptions,
    ) -> ChainStepResult {
        self.steps_seen += 1;

        // Seed, then monotonically shrink: the floor can only lose tools.
        let current = match self.allowed_tools.take() {
            Some(existing) => existing
                .intersection(&opts.initial_tools)
                .cloned()
                .collect::<BTreeSet<String>>(),
            None => opts.initial_tools.clone(),
        };
        self.allowed_tools = Some(current);

        // Budget check precedes scanning.
        let max_steps = opts.max_steps.unwrap_or(self.config.default_max_steps);
        if opts.step > max_steps {
            tracing::warn!(step = opts.step, max_steps, "chain step budget exhausted");
            return ChainStepResult {
                safe: false,
                budget_exhausted: true,
                cumulative_risk: self.cumulative_risk,
                allowed_tools: self.tools(),
                scan: None,
            };
        }

        let scan = scanner.scan(&Quarantined::tool_output(output.to_string(), "chain-step"));

        self.cumulative_risk += scan.score;
        if self.cumulative_risk > self.config.max_cumulative_risk {
            self.ceiling_hit = true;
        }

        // Privilege decay: any anomaly, even sub-block, drops the
        // high-risk tools from the floor.
        if !scan.detections.is_empty() {
            if let Some(tools) = &mut self.allowed_tools {
                for risky in &self.config.high_risk_tools {
                    tools.remove(risky);
                }
            }
        }

        let safe = scan.safe && !self.ceiling_hit;
        if !safe {
            tracing::warn!(
                step = opts.step,
                score = scan.score,
                cumulative = self.cumulative_risk,
                "chain step unsafe"
            );
        }

        ChainStepResult {
            safe,
            budget_exhausted: false,
            cumulative_risk: self.cumulative_risk,
            allowed_tools: self.tools(),
            scan: Some(scan),
        }
    }

    fn tools(&self) -> BTreeSet<String> {
        self.allowed_tools.clone().unwrap_or_default()
    }
}
