fn build_user_instructions_string(user_instructions: Option<&str>) -> Option<String> {
    let instructions = user_instructions?.trim();
    if instructions.is_empty() {
        return None;
    }

    Some(format!(
        "\n\n# Custom Instructions Provided by the User\n\nKeep the user's instructions in mind while extracting. If they are not relevant to the current extraction, ignore them.\n\nUser Instructions:\n{instructions}"
    ))
}

pub fn build_extract_system_prompt(user_instructions: Option<&str>) -> String {
    let mut parts = vec![
        "You are extracting content from a web page on behalf of a user.\nIf the user asks for a 'list' of information, or 'all' information,\nYOU MUST EXTRACT ALL OF THE INFORMATION THAT THE USER REQUESTS.\n\nYou will be given:\n1. An instruction\n2. A screenshot of the current viewport\n3. An accessibility tree of the page, one node per line as `role: name`, indented by depth".to_string(),
        "Use the accessibility tree as the primary source of text and the screenshot to resolve layout and visual context.\nCopy text exactly as it appears. Use null where the schema allows it and the information is not present.".to_string(),
        "Respond with JSON: your entire reply must be a single JSON value that matches the requested schema.".to_string(),
    ];

    if let Some(extra) = build_user_instructions_string(user_instructions) {
        parts.push(extra);
    }

    parts.join("\n\n")
}

pub fn build_extract_user_prompt(instruction: &str, tree_text: &str) -> String {
    format!("Instruction: {instruction}\nAccessibility tree:\n{tree_text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_appends_custom_instructions() {
        let base = build_extract_system_prompt(None);
        assert!(base.contains("Respond with JSON"));
        assert!(!base.contains("Custom Instructions"));

        let custom = build_extract_system_prompt(Some("  prefer ISO dates "));
        assert!(custom.starts_with(&base));
        assert!(custom.ends_with("User Instructions:\nprefer ISO dates"));

        assert_eq!(build_extract_system_prompt(Some("   ")), base);
    }

    #[test]
    fn user_prompt_includes_instruction_and_tree() {
        let prompt = build_extract_user_prompt("get the title", "heading: Example Domain");
        assert_eq!(
            prompt,
            "Instruction: get the title\nAccessibility tree:\nheading: Example Domain"
        );
    }
}
