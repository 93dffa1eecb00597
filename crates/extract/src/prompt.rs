pub fn build_chunk_summary_prompt(excerpt: &str) -> String {
    format!(
        r#"
You are a UK mortgage‑broker assistant.  
Read the following excerpt from a client’s documentation and produce a **structured summary** in jsons format.  
The JSON must contain an analysis item which is an array of assessments where the title if the item being analysed, risk_status should be one of Low, Medium, High, Insufficient Information
and explanation the reason for analysis. The JSON can optionally contain notes.

{{analysis: {{
  title: "", risk_status: "", explanation: ""
}}[]
  notes: ""
}}

**Excerpt:**
{}
"#,
        excerpt.trim()
    )
}

/// `chunk_summaries_json` is the JSON array of chunk summaries, in chunk order.
pub fn build_merge_prompt(chunk_summaries_json: &str) -> String {
    format!(
        r#"
You are a UK mortgage‑broker assistant.  
Read the following JSON data analysis of mortgage risk generated from a single client document and produce a **structured summary** in jsons format.  
The JSON must contain an analysis item which is an array of assessments where the title if the item being analysed, risk_status should be one of Low, Medium, High, Insufficient Information
and explanation the reason for analysis. The JSON can optionally contain notes.

{{analysis: {{
  title: "", risk_status: "", explanation: ""
}}[]
  notes: ""
}}

**Excerpt:**
{}
"#,
        chunk_summaries_json
    )
}

pub const OVERALL_ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a mortgage‑broker risk‑analysis assistant. Keep your answer strictly in JSON.";

pub fn build_overall_analysis_prompt(document_analysis: &str, client_data: &str) -> String {
    format!(
        r#"
You are a UK mortgage broker assistant. Analyze the client's mortgage application risk.

Document summaries: {}
Client info: {}

Return ONLY a JSON array with this exact format:
[
  {{
    "title": "Risk assessment title",
    "risk_status": "Low",
    "explanation": "Brief explanation"
  }}
]

Risk status must be: Low, Medium, High, or Insufficient Information.
No extra text outside the JSON array.
"#,
        document_analysis, client_data
    )
}
