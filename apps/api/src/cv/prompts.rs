// CV field extraction prompt templates.

pub const CV_EXTRACT_SYSTEM: &str = "\
You are a precise CV parser for a recruiting platform. \
Extract candidate details from raw CV text into structured JSON. \
The text may come from OCR and contain recognition errors; do not correct names or contact details.";

pub const CV_EXTRACT_PROMPT: &str = r#"Extract the candidate's details from the CV text below.

{no_guessing}

CV TEXT:
{cv_text}

OUTPUT SCHEMA (return exactly this structure):
{
  "full_name": "string" | null,
  "email": "string" | null,
  "phone": "string" | null,
  "location": "string" | null,
  "headline": "string" | null,
  "summary": "string" | null,
  "years_experience": number | null,
  "skills": ["string"],
  "languages": ["string"],
  "linkedin_url": "string" | null,
  "portfolio_url": "string" | null,
  "experience": [
    {"company": "string", "title": "string", "location": "string" | null,
     "start_date": "string" | null, "end_date": "string" | null, "description": "string" | null}
  ],
  "education": [
    {"institution": "string", "degree": "string" | null, "field_of_study": "string" | null,
     "start_date": "string" | null, "end_date": "string" | null}
  ]
}

Dates keep the precision found in the text ("2021", "2021-03", "present")."#;
