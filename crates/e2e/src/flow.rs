//! Declarative YAML form flows

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{E2eError, E2eResult};

/// Default bound for `wait` steps
const WAIT_TIMEOUT_MS: u64 = 5000;

/// A form flow: a named script of page interactions run against one
/// environment, e.g. filling in and submitting the application form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub steps: Vec<FlowStep>,
}

/// One interaction, tagged by `action` in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    /// Absolute URL, or a path joined with the environment base URL
    Navigate { url: String },

    /// Types `value` into the field, emptying it first unless told not to
    Fill {
        selector: String,
        value: String,
        #[serde(default = "yes")]
        clear_first: bool,
    },

    Click { selector: String },

    /// Choose the `<option>` whose value matches
    Select { selector: String, value: String },

    /// Tick (or untick) a checkbox or radio button
    Check {
        selector: String,
        #[serde(default = "yes")]
        checked: bool,
    },

    /// Poll until the element reaches `state`
    Wait {
        selector: String,
        #[serde(default = "wait_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Every given expectation must hold for the first match; `count`
    /// applies to all matches
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Saved under `flows/<environment>/<flow>_<name>.png`
    Screenshot { name: String },

    Sleep { ms: u64 },
}

fn yes() -> bool {
    true
}

fn wait_timeout_ms() -> u64 {
    WAIT_TIMEOUT_MS
}

/// Element state a `wait` step polls for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
}

impl FlowStep {
    /// Short label used in logs and failure messages
    pub fn label(&self) -> String {
        match self {
            FlowStep::Navigate { url } => format!("navigate:{}", url),
            FlowStep::Fill { selector, .. } => format!("fill:{}", selector),
            FlowStep::Click { selector } => format!("click:{}", selector),
            FlowStep::Select { selector, .. } => format!("select:{}", selector),
            FlowStep::Check { selector, .. } => format!("check:{}", selector),
            FlowStep::Wait { selector, .. } => format!("wait:{}", selector),
            FlowStep::Assert { selector, .. } => format!("assert:{}", selector),
            FlowStep::Screenshot { name } => format!("screenshot:{}", name),
            FlowStep::Sleep { ms } => format!("sleep:{}ms", ms),
        }
    }
}

impl FlowSpec {
    /// A flow must have at least one step
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let flow: FlowSpec = serde_yaml::from_str(yaml)?;
        match flow.steps.is_empty() {
            true => Err(E2eError::SpecParse(format!("flow '{}' has no steps", flow.name))),
            false => Ok(flow),
        }
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        FlowSpec::from_yaml(&yaml).map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Every `*.yaml`/`*.yml` under `dir`, in path order so runs are
    /// repeatable. A missing directory, an unreadable entry or one
    /// unparsable file fails the whole load.
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::SpecParse(format!(
                "flows directory {} does not exist",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| E2eError::SpecParse(format!("{}: {}", dir.display(), e)))?;
            if entry.file_type().is_file() && is_flow_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        files.iter().map(|path| FlowSpec::from_file(path)).collect()
    }
}

fn is_flow_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
