//! Static deployment catalogue
//!
//! The script order is total and fixed: tables, then functions, then
//! triggers, then row-level-security policies. Nothing is discovered by
//! scanning the script tree.

use crate::db::TableRef;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptCategory {
    Schema,
    Function,
    Trigger,
    SecurityPolicy,
}

impl ScriptCategory {
    /// Phase order
    pub const ALL: [ScriptCategory; 4] = [
        ScriptCategory::Schema,
        ScriptCategory::Function,
        ScriptCategory::Trigger,
        ScriptCategory::SecurityPolicy,
    ];

    /// Folder under the script root
    pub fn directory(self) -> &'static str {
        match self {
            ScriptCategory::Schema => "DDL",
            ScriptCategory::Function => "FUNCTIONS",
            ScriptCategory::Trigger => "TRIGGERS",
            ScriptCategory::SecurityPolicy => "RLS",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScriptCategory::Schema => "DDL SCRIPTS",
            ScriptCategory::Function => "FUNCTIONS",
            ScriptCategory::Trigger => "TRIGGERS",
            ScriptCategory::SecurityPolicy => "RLS POLICIES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentScript {
    pub category: ScriptCategory,
    pub filename: &'static str,
    /// 1-based position in [`DEPLOYMENT_ORDER`]
    pub position: usize,
}

impl DeploymentScript {
    const fn new(position: usize, category: ScriptCategory, filename: &'static str) -> Self {
        Self {
            category,
            filename,
            position,
        }
    }

    /// `DDL/CREATE_new_agents.sql`
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.category.directory(), self.filename)
    }
}

pub const DEPLOYMENT_ORDER: [DeploymentScript; 10] = [
    DeploymentScript::new(1, ScriptCategory::Schema, "CREATE_company_info_raw.sql"),
    DeploymentScript::new(2, ScriptCategory::Schema, "CREATE_unified_company_member.sql"),
    DeploymentScript::new(3, ScriptCategory::Schema, "CREATE_new_agents.sql"),
    DeploymentScript::new(4, ScriptCategory::Schema, "CREATE_unified_merge_logs.sql"),
    DeploymentScript::new(5, ScriptCategory::Schema, "CREATE_new_unified_agents.sql"),
    DeploymentScript::new(6, ScriptCategory::Function, "helper_functions.sql"),
    DeploymentScript::new(7, ScriptCategory::Function, "run_unified_member_pipeline.SQL"),
    DeploymentScript::new(8, ScriptCategory::Function, "run_unified_merge_batch.sql"),
    DeploymentScript::new(9, ScriptCategory::Trigger, "TRG_new_unified_agents.sql"),
    DeploymentScript::new(10, ScriptCategory::SecurityPolicy, "RLS_enable_rls.sql"),
];

/// Scripts of one category, in declared order
pub fn scripts_for(category: ScriptCategory) -> impl Iterator<Item = &'static DeploymentScript> {
    DEPLOYMENT_ORDER.iter().filter(move |s| s.category == category)
}

const RECREATE_PREFIX: &str = "CREATE_";
const RECREATE_SUFFIX: &str = ".sql";

/// Tables a schema script may be dropped and recreated for
const RECREATE_TABLES: [(&str, TableRef); 5] = [
    ("company_info_raw", TableRef::new("bronze", "company_info_raw")),
    ("unified_company_member", TableRef::new("public", "unified_company_member")),
    ("new_agents", TableRef::new("public", "new_agents")),
    ("unified_merge_logs", TableRef::new("public", "unified_merge_logs")),
    ("new_unified_agents", TableRef::new("public", "new_unified_agents")),
];

/// Table created by a schema script, from `CREATE_<table>.sql`.
/// Unknown names resolve to `None`, meaning no drop is applied.
pub fn recreate_target(filename: &str) -> Option<TableRef> {
    let token = filename
        .strip_prefix(RECREATE_PREFIX)?
        .strip_suffix(RECREATE_SUFFIX)?;
    RECREATE_TABLES
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, table)| *table)
}

/// Tables verification expects after a deployment
pub const EXPECTED_TABLES: [TableRef; 5] = [
    TableRef::new("bronze", "company_info_raw"),
    TableRef::new("public", "unified_company_member"),
    TableRef::new("public", "new_agents"),
    TableRef::new("public", "unified_merge_logs"),
    TableRef::new("public", "new_unified_agents"),
];

pub const FUNCTION_SCHEMA: &str = "public";

/// Functions verification expects in [`FUNCTION_SCHEMA`]
pub const EXPECTED_FUNCTIONS: [&str; 4] = [
    "array_merge_unique",
    "update_last_updated_column",
    "run_unified_member_pipeline",
    "run_unified_merge_batch",
];
