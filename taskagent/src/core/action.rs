//! Action wire type and the closed set of action kinds.
//!
//! [`Action`] is the flat JSON record planners emit: a `type` tag plus any
//! kind-specific fields. Fields that a kind does not use are carried along and
//! ignored. [`ActionKind`] is the closed enum that every `type` must parse into;
//! its exhaustive matches are the single mapping table for categories,
//! destructiveness and required fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One mutating operation against the task API, as authored in a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Project name or `id:` reference, resolved at dispatch time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Section name or `id:` reference, resolved within the action's project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Parent task id, or parent project reference for `project_add`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    /// Natural-language due date. Older plans call this `due`.
    #[serde(default, alias = "due", skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// Collaborator name or email, resolved against the target project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,

    /// Planner's explanation. Shown in previews, never sent to the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            action_type: kind.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> Result<ActionKind, UnknownActionType> {
        self.action_type.parse()
    }
}

/// Coarse grouping used for plan summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Task,
    Project,
    Section,
    Label,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionType(pub String);

impl fmt::Display for UnknownActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported action type: {}", self.0)
    }
}

impl std::error::Error for UnknownActionType {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    TaskAdd,
    TaskUpdate,
    TaskMove,
    TaskComplete,
    TaskReopen,
    TaskDelete,
    ProjectAdd,
    ProjectUpdate,
    ProjectArchive,
    ProjectUnarchive,
    ProjectDelete,
    SectionAdd,
    SectionUpdate,
    SectionDelete,
    LabelAdd,
    LabelUpdate,
    LabelDelete,
    CommentAdd,
    CommentUpdate,
    CommentDelete,
}

impl ActionKind {
    pub const ALL: [ActionKind; 20] = [
        ActionKind::TaskAdd,
        ActionKind::TaskUpdate,
        ActionKind::TaskMove,
        ActionKind::TaskComplete,
        ActionKind::TaskReopen,
        ActionKind::TaskDelete,
        ActionKind::ProjectAdd,
        ActionKind::ProjectUpdate,
        ActionKind::ProjectArchive,
        ActionKind::ProjectUnarchive,
        ActionKind::ProjectDelete,
        ActionKind::SectionAdd,
        ActionKind::SectionUpdate,
        ActionKind::SectionDelete,
        ActionKind::LabelAdd,
        ActionKind::LabelUpdate,
        ActionKind::LabelDelete,
        ActionKind::CommentAdd,
        ActionKind::CommentUpdate,
        ActionKind::CommentDelete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::TaskAdd => "task_add",
            ActionKind::TaskUpdate => "task_update",
            ActionKind::TaskMove => "task_move",
            ActionKind::TaskComplete => "task_complete",
            ActionKind::TaskReopen => "task_reopen",
            ActionKind::TaskDelete => "task_delete",
            ActionKind::ProjectAdd => "project_add",
            ActionKind::ProjectUpdate => "project_update",
            ActionKind::ProjectArchive => "project_archive",
            ActionKind::ProjectUnarchive => "project_unarchive",
            ActionKind::ProjectDelete => "project_delete",
            ActionKind::SectionAdd => "section_add",
            ActionKind::SectionUpdate => "section_update",
            ActionKind::SectionDelete => "section_delete",
            ActionKind::LabelAdd => "label_add",
            ActionKind::LabelUpdate => "label_update",
            ActionKind::LabelDelete => "label_delete",
            ActionKind::CommentAdd => "comment_add",
            ActionKind::CommentUpdate => "comment_update",
            ActionKind::CommentDelete => "comment_delete",
        }
    }

    pub fn category(self) -> Category {
        match self {
            ActionKind::TaskAdd
            | ActionKind::TaskUpdate
            | ActionKind::TaskMove
            | ActionKind::TaskComplete
            | ActionKind::TaskReopen
            | ActionKind::TaskDelete => Category::Task,
            ActionKind::ProjectAdd
            | ActionKind::ProjectUpdate
            | ActionKind::ProjectArchive
            | ActionKind::ProjectUnarchive
            | ActionKind::ProjectDelete => Category::Project,
            ActionKind::SectionAdd | ActionKind::SectionUpdate | ActionKind::SectionDelete => {
                Category::Section
            }
            ActionKind::LabelAdd | ActionKind::LabelUpdate | ActionKind::LabelDelete => {
                Category::Label
            }
            ActionKind::CommentAdd | ActionKind::CommentUpdate | ActionKind::CommentDelete => {
                Category::Comment
            }
        }
    }

    /// Irreversible deletion or archival.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            ActionKind::TaskDelete
                | ActionKind::ProjectDelete
                | ActionKind::SectionDelete
                | ActionKind::LabelDelete
                | ActionKind::CommentDelete
                | ActionKind::ProjectArchive
        )
    }

    /// Check the kind's required-field contract.
    ///
    /// Returns the first violated requirement as a user-facing message.
    pub fn check_required(self, action: &Action) -> Result<(), String> {
        let name = self.as_str();
        let require = |ok: bool, message: String| if ok { Ok(()) } else { Err(message) };
        match self {
            ActionKind::TaskAdd => require(present(&action.content), format!("{name} requires content")),
            ActionKind::TaskUpdate
            | ActionKind::TaskComplete
            | ActionKind::TaskReopen
            | ActionKind::TaskDelete => {
                require(present(&action.task_id), format!("{name} requires task_id"))
            }
            ActionKind::TaskMove => {
                require(present(&action.task_id), format!("{name} requires task_id"))?;
                require(
                    present(&action.project)
                        || present(&action.project_id)
                        || present(&action.section)
                        || present(&action.section_id)
                        || present(&action.parent)
                        || present(&action.parent_id),
                    format!("{name} requires project/project_id, section/section_id, or parent"),
                )
            }
            ActionKind::ProjectAdd => require(present(&action.name), format!("{name} requires name")),
            ActionKind::ProjectUpdate
            | ActionKind::ProjectArchive
            | ActionKind::ProjectUnarchive
            | ActionKind::ProjectDelete => {
                require(present(&action.project_id), format!("{name} requires project_id"))
            }
            ActionKind::SectionAdd => require(
                present(&action.name) && (present(&action.project) || present(&action.project_id)),
                format!("{name} requires name and project/project_id"),
            ),
            ActionKind::SectionUpdate => {
                require(present(&action.section_id), format!("{name} requires section_id"))?;
                require(present(&action.name), format!("{name} requires name"))
            }
            ActionKind::SectionDelete => {
                require(present(&action.section_id), format!("{name} requires section_id"))
            }
            ActionKind::LabelAdd => require(present(&action.name), format!("{name} requires name")),
            ActionKind::LabelUpdate | ActionKind::LabelDelete => {
                require(present(&action.label_id), format!("{name} requires label_id"))
            }
            ActionKind::CommentAdd => {
                require(present(&action.content), format!("{name} requires content"))?;
                require(
                    present(&action.task_id)
                        || present(&action.project)
                        || present(&action.project_id),
                    format!("{name} requires task_id or project/project_id"),
                )
            }
            ActionKind::CommentUpdate => {
                require(present(&action.comment_id), format!("{name} requires comment_id"))?;
                require(present(&action.content), format!("{name} requires content"))
            }
            ActionKind::CommentDelete => {
                require(present(&action.comment_id), format!("{name} requires comment_id"))
            }
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownActionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| UnknownActionType(s.to_string()))
    }
}

/// Non-empty after trimming.
pub fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Trimmed value when present.
pub fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
