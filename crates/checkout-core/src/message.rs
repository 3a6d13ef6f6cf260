//! Host Messages
//!
//! Messages an embedded UI posts back to the hosting runtime. They are
//! one-way: the host never acknowledges them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload asking the host to invoke a tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Message posted from an embedded surface to its host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum HostMessage {
    /// Invoke a tool on the host
    Tool(ToolInvocation),
}

/// Closing notification of the payment step
///
/// Carries no parameters; it only tells the host the tool's work is done.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionSignal {
    tool_name: String,
}

impl CompletionSignal {
    pub fn for_tool(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn to_host_message(&self) -> HostMessage {
        HostMessage::Tool(ToolInvocation {
            tool_name: self.tool_name.clone(),
            params: HashMap::new(),
        })
    }
}

/// Escape JSON text so it cannot close a surrounding `<script>` element
pub fn script_safe(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
