// Shared prompt fragments. Each pipeline stage that calls the LLM keeps its own
// templates alongside it; this file only holds cross-cutting pieces.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
