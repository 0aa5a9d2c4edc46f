use serde::{Deserialize, Serialize};

/// State given to tasks that only exist because something depends on them.
pub const SCHEDULED_STATE: &str = "scheduled";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    #[serde(alias = "task")]
    Leaf,
    #[serde(alias = "subflow", alias = "group")]
    Flow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TaskRecord {
    pub fn leaf(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: TaskKind::Leaf,
            state: default_state(),
            name: None,
        }
    }

    pub fn flow(id: &str) -> Self {
        Self {
            kind: TaskKind::Flow,
            ..Self::leaf(id)
        }
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.state = state.to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}

impl DependencyRecord {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

/// One snapshot of a run as handed over by the data-access layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
}

impl RunRecord {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn task(mut self, record: TaskRecord) -> Self {
        self.tasks.push(record);
        self
    }

    pub fn depends(mut self, source: &str, target: &str) -> Self {
        self.dependencies.push(DependencyRecord::new(source, target));
        self
    }
}

fn default_state() -> String {
    SCHEDULED_STATE.to_string()
}
