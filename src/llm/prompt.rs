const SYSTEM_PROMPT: &str = r#"You convert instructions for a business web application into a browser automation plan.
Reply with a single JSON object of the form {"actionPlan": [ ... ]} and nothing else.

Each entry is {"action": <name>, "details": {...}} with one of these actions:
- "click": details.selector
- "type": details.selector, details.text
- "selectByValue": details.selector, details.value
- "waitFor": details.selector (element present in the document)
- "waitForVisible": details.selector (element rendered on screen)
- "sleep": details.ms (milliseconds, default 1000)
- "app_launcher": details.objectName (opens the "New" form of that object via the app launcher)

details.selector is a CSS selector or an XPath expression, or an array of them in preference order.
details.timeout is an optional element timeout in milliseconds (default 10000).
Prefer stable attributes (name, data-*, aria-label, title) over generated ids and classes.
Start with "app_launcher" when the instruction asks to create a record."#;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn build_user_prompt(&self, instruction: &str) -> String {
        format!("Instruction: {}", instruction.trim())
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
