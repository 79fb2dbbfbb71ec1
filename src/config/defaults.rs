//! Default configuration constants and the built-in default document.

use super::types::*;
use super::ConfigDocument;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// JSON schema URL written into every new document.
pub const DEFAULT_SCHEMA_URL: &str = "https://opencode.ai/config.json";

/// Default primary model.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4-20250514";

/// Default leader key.
pub const DEFAULT_LEADER_KEY: &str = "ctrl+x";

/// File name of the configuration document inside the config directory.
pub const CONFIG_FILE_NAME: &str = "opencode.json";

/// Directory name under the platform config root.
pub const CONFIG_DIR_NAME: &str = "opencode";

/// Decision returned when no rule or pattern applies.
pub const FALLBACK_ACTION: PermissionAction = PermissionAction::Ask;

/// Tools that accept a permission rule.
pub const TOOL_PERMISSIONS: &[&str] = &[
    "read",
    "edit",
    "glob",
    "grep",
    "list",
    "bash",
    "task",
    "skill",
    "lsp",
    "todoread",
    "todowrite",
    "question",
    "webfetch",
    "websearch",
    "codesearch",
    "external_directory",
    "doom_loop",
];

/// Tools whose rule must be a single action, never a pattern map.
pub const SCALAR_ONLY_TOOLS: &[&str] = &[
    "todoread",
    "todowrite",
    "question",
    "webfetch",
    "websearch",
    "codesearch",
    "doom_loop",
];

pub const BUILTIN_PROVIDERS: &[&str] = &[
    "anthropic",
    "openai",
    "google",
    "azure",
    "azure-cognitive",
    "bedrock",
    "openrouter",
    "groq",
    "xai",
];

pub const BUILTIN_LSP_SERVERS: &[&str] = &["typescript", "python", "go", "rust", "java", "csharp"];

/// Agents the runtime always provides, valid as `default_agent` without a
/// matching `agent` entry.
pub const BUILTIN_AGENTS: &[&str] = &["build", "plan", "general"];

/// Keybind actions grouped by category.
pub const KEYBIND_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "application",
        &[
            "leader",
            "app_exit",
            "editor_open",
            "theme_list",
            "sidebar_toggle",
            "scrollbar_toggle",
            "username_toggle",
            "status_view",
            "tool_details",
            "display_thinking",
        ],
    ),
    (
        "session",
        &[
            "session_export",
            "session_new",
            "session_list",
            "session_timeline",
            "session_fork",
            "session_rename",
            "session_delete",
            "session_share",
            "session_unshare",
            "session_interrupt",
            "session_compact",
            "session_child_cycle",
            "session_child_cycle_reverse",
            "session_parent",
        ],
    ),
    ("stash", &["stash_delete"]),
    (
        "messages",
        &[
            "messages_page_up",
            "messages_page_down",
            "messages_line_up",
            "messages_line_down",
            "messages_half_page_up",
            "messages_half_page_down",
            "messages_first",
            "messages_last",
            "messages_next",
            "messages_previous",
            "messages_copy",
            "messages_undo",
            "messages_redo",
            "messages_last_user",
            "messages_toggle_conceal",
        ],
    ),
    (
        "model",
        &[
            "model_list",
            "model_cycle_recent",
            "model_cycle_recent_reverse",
            "model_cycle_favorite",
            "model_cycle_favorite_reverse",
            "model_provider_list",
            "model_favorite_toggle",
            "variant_cycle",
        ],
    ),
    (
        "command",
        &["command_list", "agent_list", "agent_cycle", "agent_cycle_reverse"],
    ),
    (
        "input",
        &[
            "input_clear",
            "input_paste",
            "input_submit",
            "input_newline",
            "input_move_left",
            "input_move_right",
            "input_move_up",
            "input_move_down",
            "input_select_left",
            "input_select_right",
            "input_select_up",
            "input_select_down",
            "input_line_home",
            "input_line_end",
            "input_select_line_home",
            "input_select_line_end",
            "input_visual_line_home",
            "input_visual_line_end",
            "input_select_visual_line_home",
            "input_select_visual_line_end",
            "input_buffer_home",
            "input_buffer_end",
            "input_select_buffer_home",
            "input_select_buffer_end",
            "input_delete_line",
            "input_delete_to_line_end",
            "input_delete_to_line_start",
            "input_backspace",
            "input_delete",
            "input_undo",
            "input_redo",
            "input_word_forward",
            "input_word_backward",
            "input_select_word_forward",
            "input_select_word_backward",
            "input_delete_word_forward",
            "input_delete_word_backward",
        ],
    ),
    ("history", &["history_previous", "history_next"]),
    (
        "terminal",
        &["terminal_suspend", "terminal_title_toggle", "tips_toggle"],
    ),
];

pub fn is_known_keybind(action: &str) -> bool {
    KEYBIND_CATEGORIES
        .iter()
        .any(|(_, actions)| actions.contains(&action))
}

/// opencode's stock key chords, as shipped in the everyday preset.
pub const DEFAULT_KEYBINDS: &[(&str, &str)] = &[
    ("leader", DEFAULT_LEADER_KEY),
    ("app_exit", "ctrl+c,ctrl+d,<leader>q"),
    ("editor_open", "<leader>e"),
    ("theme_list", "<leader>t"),
    ("sidebar_toggle", "<leader>b"),
    ("scrollbar_toggle", "none"),
    ("username_toggle", "none"),
    ("status_view", "<leader>s"),
    ("tool_details", "none"),
    ("session_export", "<leader>x"),
    ("session_new", "<leader>n"),
    ("session_list", "<leader>l"),
    ("session_timeline", "<leader>g"),
    ("session_fork", "none"),
    ("session_rename", "none"),
    ("session_share", "none"),
    ("session_unshare", "none"),
    ("session_interrupt", "escape"),
    ("session_compact", "<leader>c"),
    ("session_child_cycle", "<leader>right"),
    ("session_child_cycle_reverse", "<leader>left"),
    ("messages_page_up", "pageup"),
    ("messages_page_down", "pagedown"),
    ("messages_half_page_up", "ctrl+alt+u"),
    ("messages_half_page_down", "ctrl+alt+d"),
    ("messages_first", "ctrl+g,home"),
    ("messages_last", "ctrl+alt+g,end"),
    ("messages_copy", "<leader>y"),
    ("messages_undo", "<leader>u"),
    ("messages_redo", "<leader>r"),
    ("messages_toggle_conceal", "<leader>h"),
    ("model_list", "<leader>m"),
    ("model_cycle_recent", "f2"),
    ("model_cycle_recent_reverse", "shift+f2"),
    ("command_list", "ctrl+p"),
    ("agent_list", "<leader>a"),
    ("agent_cycle", "tab"),
    ("agent_cycle_reverse", "shift+tab"),
    ("input_clear", "ctrl+c"),
    ("input_paste", "ctrl+v"),
    ("input_submit", "return"),
    ("input_newline", "shift+return,ctrl+j"),
    ("history_previous", "up"),
    ("history_next", "down"),
    ("terminal_suspend", "ctrl+z"),
];

/// [`DEFAULT_KEYBINDS`] as a keybinds map.
pub fn default_keybinds() -> IndexMap<String, String> {
    DEFAULT_KEYBINDS
        .iter()
        .map(|(action, chord)| (action.to_string(), chord.to_string()))
        .collect()
}

/// Built-in defaults. Every field here is fully specified; the effective
/// configuration is `DEFAULT_CONFIGURATION.merge(document)`.
pub static DEFAULT_CONFIGURATION: Lazy<ConfigDocument> = Lazy::new(|| {
    let patterns = |action: PermissionAction| {
        PermissionRule::Patterns(IndexMap::from([("*".to_string(), action)]))
    };

    ConfigDocument {
        schema: Some(DEFAULT_SCHEMA_URL.to_string()),
        model: Some(DEFAULT_MODEL.to_string()),
        permission: Some(PermissionConfig::Tools(IndexMap::from([
            ("bash".to_string(), patterns(PermissionAction::Ask)),
            ("edit".to_string(), patterns(PermissionAction::Ask)),
            ("read".to_string(), patterns(PermissionAction::Allow)),
        ]))),
        keybinds: Some(IndexMap::from([(
            "leader".to_string(),
            DEFAULT_LEADER_KEY.to_string(),
        )])),
        share: Some(ShareSetting::Auto),
        autoupdate: Some(AutoUpdate::Flag(true)),
        tui: Some(TuiConfig {
            scroll_speed: Some(3.0),
            scroll_acceleration: Some(ScrollAcceleration {
                enabled: true,
                ..Default::default()
            }),
            diff_style: Some(DiffStyle::Auto),
            ..Default::default()
        }),
        compaction: Some(CompactionConfig {
            auto: Some(true),
            prune: Some(false),
            ..Default::default()
        }),
        snapshot: Some(true),
        ..Default::default()
    }
});

/// Document returned when the configuration file does not exist yet.
pub fn minimal_document() -> ConfigDocument {
    ConfigDocument {
        schema: Some(DEFAULT_SCHEMA_URL.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_serialize_to_expected_shape() {
        let value = serde_json::to_value(&*DEFAULT_CONFIGURATION).unwrap();
        assert_eq!(value["$schema"], DEFAULT_SCHEMA_URL);
        assert_eq!(value["permission"]["read"], json!({"*": "allow"}));
        assert_eq!(value["tui"]["scroll_speed"], 3.0);
        assert_eq!(value["tui"]["scroll_acceleration"]["enabled"], true);
        assert_eq!(value["compaction"]["prune"], false);
        assert_eq!(value["share"], "auto");
        assert_eq!(value["autoupdate"], true);
        assert_eq!(value["keybinds"]["leader"], "ctrl+x");
    }

    #[test]
    fn defaults_are_a_fixed_point_of_effective() {
        let defaults = DEFAULT_CONFIGURATION.clone();
        assert_eq!(defaults.effective(), defaults);
    }

    #[test]
    fn scalar_only_tools_are_known_tools() {
        for tool in SCALAR_ONLY_TOOLS {
            assert!(TOOL_PERMISSIONS.contains(tool), "{tool} missing");
        }
    }

    #[test]
    fn keybind_lookup() {
        assert!(is_known_keybind("leader"));
        assert!(is_known_keybind("history_next"));
        assert!(!is_known_keybind("make_coffee"));
    }

    #[test]
    fn default_keybinds_use_known_actions() {
        let map = default_keybinds();
        assert_eq!(map.len(), DEFAULT_KEYBINDS.len());
        assert_eq!(map["leader"], "ctrl+x");
        for action in map.keys() {
            assert!(is_known_keybind(action), "{action} is not a known action");
        }
    }

    #[test]
    fn minimal_document_only_has_schema() {
        let value = serde_json::to_value(minimal_document()).unwrap();
        assert_eq!(value, json!({"$schema": DEFAULT_SCHEMA_URL}));
    }
}
