// Cross-cutting prompt fragments. Each service that needs LLM calls
// defines its own prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction appended to extraction prompts to discourage invented values.
pub const NO_GUESSING_INSTRUCTION: &str = "\
    Only report values that appear in the source text. \
    If a field is not present, use null (or an empty array for lists). \
    Never guess, infer or invent contact details, dates or employers.";
