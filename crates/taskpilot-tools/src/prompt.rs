//! Tool-catalogue-to-prompt conversion

use crate::schema::ToolSchema;

/// Format one tool definition as a markdown section.
pub fn format_tool(tool: &ToolSchema) -> String {
    let mut output = String::new();

    output.push_str(&format!("### {}\n", tool.name));
    output.push_str(&format!("{}\n", tool.description));

    let properties = tool.properties();
    if properties.is_empty() {
        output.push_str("Parameters: none\n");
    } else {
        let required = tool.required();
        output.push_str("Parameters:\n");
        for (name, type_name, description) in properties {
            let requirement = if required.contains(&name) {
                "required"
            } else {
                "optional"
            };
            if description.is_empty() {
                output.push_str(&format!("- `{name}` ({type_name}, {requirement})\n"));
            } else {
                output.push_str(&format!(
                    "- `{name}` ({type_name}, {requirement}): {description}\n"
                ));
            }
        }
    }

    output
}

/// Format the whole catalogue for embedding into a planning or
/// decision prompt.
pub fn format_catalog(tools: &[ToolSchema]) -> String {
    if tools.is_empty() {
        return "No tools are available.\n".to_string();
    }

    let mut output = String::from("## AVAILABLE TOOLS\n\n");
    for tool in tools {
        output.push_str(&format_tool(tool));
        output.push('\n');
    }
    output
}
