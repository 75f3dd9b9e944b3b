// All LLM prompt constants for the screening stages.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for resume extraction.
pub const EXTRACTION_SYSTEM: &str = "You are a precise resume parser. \
    Extract structured candidate data from resume text. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Extraction prompt template. Replace `{resume_text}` before sending.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract the candidate's information from the resume below.

Return a JSON object with this EXACT schema (use null or [] when a field is absent):
{
  "full_name": "Jane Doe",
  "contact": {"email": "jane@example.com", "phone": "+1 555 010 4477"},
  "experience_years": 3.5,
  "experience": [
    {
      "title": "Machine Learning Engineer",
      "organization": "Acme Corp",
      "duration": "2021 - 2024",
      "highlights": ["Shipped a retrieval pipeline serving 2M queries/day"]
    }
  ],
  "education": [
    {"degree": "B.Sc. Computer Science", "institution": "State University", "year": "2020"}
  ],
  "skills": ["Python", "PyTorch"],
  "certifications": ["AWS Certified Machine Learning - Specialty"]
}

Rules:
1. experience_years is your estimate of total professional experience from the work history.
2. List experience and education most recent first.
3. Copy skills as written in the resume; do not add skills the resume does not mention.
4. Never invent contact details.

RESUME:
{resume_text}"#;

/// System prompt for candidate scoring.
pub const SCORING_SYSTEM: &str = "You are an impartial technical recruiter scoring a \
    candidate against a job description with a fixed rubric. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Scoring prompt template.
/// Replace: {fairness_instruction}, {candidate_json}, {job_text}, {threshold}
pub const SCORING_PROMPT_TEMPLATE: &str = r#"{fairness_instruction}

Score the candidate below against the job requirements.

RUBRIC (each criterion scored 0-100, overall is the weighted sum):
- skills_match (40%): coverage of the skills the job requires
- experience_relevance (30%): years and relevance of work history to the role
- education_fit (20%): degree level and field relative to the role
- certifications (10%): relevant certifications

The candidate proceeds to interview when overall_score >= {threshold}.

Return a JSON object with this EXACT schema:
{
  "overall_score": 82,
  "sub_scores": {
    "skills_match": 90,
    "experience_relevance": 75,
    "education_fit": 80,
    "certifications": 50
  },
  "matched_skills": ["Python"],
  "missing_skills": ["Kubernetes"],
  "role_title": "AI Engineer",
  "rationale": "Two or three sentences explaining the score.",
  "recommendation": "PROCEED"
}

CANDIDATE:
{candidate_json}

JOB REQUIREMENTS:
{job_text}"#;

/// System prompt for interview question generation.
pub const REPORT_SYSTEM: &str = "You are an experienced technical interviewer preparing \
    an HR report for a shortlisted candidate. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Report prompt template.
/// Replace: {fairness_instruction}, {candidate_json}, {score_json}
pub const REPORT_PROMPT_TEMPLATE: &str = r#"{fairness_instruction}

Prepare interview material for the candidate below, who passed screening.

Return a JSON object with this EXACT schema:
{
  "interview_questions": [
    "Walk us through how you would close your gap in Kubernetes within your first month."
  ],
  "summary": "Two or three sentences an HR manager can read in ten seconds."
}

Rules:
1. Write exactly 5 interview questions.
2. At least two questions must target the missing skills listed in the score.
3. At least one question must target gaps or short tenures in the work history.
4. Questions must be answerable in a 45-minute interview.

CANDIDATE:
{candidate_json}

SCORE:
{score_json}"#;

/// System prompt for the email agent turn. The model decides whether to call the tool.
pub const EMAIL_AGENT_SYSTEM: &str = "You are an HR coordinator assistant. \
    You have access to tools. When an interview invitation is appropriate, call the \
    interview email tool with accurate arguments taken from the candidate data. \
    Do not write the email yourself.";

/// Email agent prompt template.
/// Replace: {candidate_name}, {candidate_email}, {role_title}, {recommendation},
///          {overall_score}, {top_skills}
pub const EMAIL_AGENT_PROMPT_TEMPLATE: &str = r#"The screening for this candidate is complete.

Candidate name: {candidate_name}
Candidate email: {candidate_email}
Role: {role_title}
Recommendation: {recommendation}
Overall score: {overall_score}/100
Top skills: {top_skills}

Prepare the interview invitation email for this candidate."#;
