//! Pattern-based field extraction over normalized resume text.
//!
//! This is the last rung of the extraction ladder: no model involved, so it
//! must work on anything, including empty and non-English input.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::screening::models::{CandidateRecord, Contact, EducationEntry, ExperienceEntry};

lazy_static! {
    static ref RE_EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();

    /// Phone-like runs: optional +, digits with common separators
    static ref RE_PHONE: Regex = Regex::new(r"\+?\(?\d[\d\s().-]{6,}\d").unwrap();

    /// "3 years", "5+ yrs", "2.5 years"
    static ref RE_YEARS: Regex =
        Regex::new(r"(?i)\b(\d{1,2}(?:\.\d)?)\s*\+?\s*(?:years?|yrs?)\b").unwrap();

    static ref RE_YEAR: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").unwrap();

    static ref RE_DEGREE: Regex = Regex::new(
        r"(?i)\b(?:bachelor|master|ph\.?d|doctorate|mba|b\.?sc?\b|m\.?sc?\b|b\.?tech|m\.?tech|b\.e\b|m\.e\b|b\.a\b|m\.a\b|associate degree|diploma)"
    )
    .unwrap();

    static ref RE_CERTIFICATION: Regex =
        Regex::new(r"(?i)\b(?:certified|certification|certificate)\b").unwrap();

    static ref RE_ROLE: Regex = Regex::new(
        r"(?i)\b(?:engineer|developer|scientist|analyst|architect|manager|consultant|intern|designer|administrator|researcher|lead)\b"
    )
    .unwrap();
}

const MAX_EXPERIENCE_ENTRIES: usize = 10;
const MAX_HIGHLIGHTS: usize = 4;

const SECTION_HEADINGS: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "employment",
    "education",
    "skills",
    "technical skills",
    "certifications",
    "projects",
    "summary",
    "contact",
];

/// Canonical skill name plus the lowercase spellings that count as a mention.
const SKILL_VOCABULARY: &[(&str, &[&str])] = &[
    ("Python", &["python"]),
    ("Rust", &["rust"]),
    ("Java", &["java"]),
    ("JavaScript", &["javascript", "js"]),
    ("TypeScript", &["typescript"]),
    ("Go", &["golang"]),
    ("C++", &["c++"]),
    ("C#", &["c#"]),
    ("SQL", &["sql", "postgresql", "mysql"]),
    ("HTML", &["html"]),
    ("CSS", &["css"]),
    ("React", &["react", "react.js", "reactjs"]),
    ("Node.js", &["node.js", "nodejs", "node"]),
    ("Django", &["django"]),
    ("Flask", &["flask"]),
    ("FastAPI", &["fastapi"]),
    ("Docker", &["docker"]),
    ("Kubernetes", &["kubernetes", "k8s"]),
    ("AWS", &["aws", "amazon web services"]),
    ("GCP", &["gcp", "google cloud"]),
    ("Azure", &["azure"]),
    ("Git", &["git"]),
    ("Linux", &["linux"]),
    ("Machine Learning", &["machine learning", "ml"]),
    ("Deep Learning", &["deep learning"]),
    ("NLP", &["nlp", "natural language processing"]),
    ("LLM", &["llm", "llms", "large language models"]),
    ("LangChain", &["langchain"]),
    ("TensorFlow", &["tensorflow"]),
    ("PyTorch", &["pytorch"]),
    ("scikit-learn", &["scikit-learn", "sklearn"]),
    ("Pandas", &["pandas"]),
    ("NumPy", &["numpy"]),
    ("Computer Vision", &["computer vision", "opencv"]),
    ("MLOps", &["mlops"]),
    ("REST APIs", &["rest api", "rest apis", "restful"]),
    ("GraphQL", &["graphql"]),
    ("Spark", &["spark", "pyspark"]),
    ("Kafka", &["kafka"]),
    ("Redis", &["redis"]),
    ("MongoDB", &["mongodb"]),
    ("CI/CD", &["ci/cd"]),
    ("Terraform", &["terraform"]),
];

/// True when `term` occurs in `haystack` (both lowercase) as a whole token:
/// the neighbouring characters must not be alphanumeric.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Vocabulary skills mentioned anywhere in `text`, by canonical name.
pub fn detect_skills(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    SKILL_VOCABULARY
        .iter()
        .filter(|(_, spellings)| spellings.iter().any(|s| contains_term(&lower, s)))
        .map(|(canonical, _)| canonical.to_string())
        .collect()
}

/// Maps a free-form skill string onto the vocabulary when it names a known skill.
pub fn canonical_skill(skill: &str) -> Option<&'static str> {
    let lower = skill.trim().to_lowercase();
    SKILL_VOCABULARY
        .iter()
        .find(|(canonical, spellings)| {
            canonical.to_lowercase() == lower || spellings.iter().any(|s| contains_term(&lower, s))
        })
        .map(|(canonical, _)| *canonical)
}

pub fn find_email(text: &str) -> Option<String> {
    RE_EMAIL.find(text).map(|m| m.as_str().to_string())
}

/// First phone-like run with 7 to 15 digits that is not a year range.
pub fn find_phone(text: &str) -> Option<String> {
    RE_PHONE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .find(|candidate| {
            let digits = candidate.chars().filter(char::is_ascii_digit).count();
            (7..=15).contains(&digits) && !RE_YEAR.is_match(candidate)
                || (10..=15).contains(&digits)
        })
        .map(str::to_string)
}

/// Largest "N years" figure in the text.
pub fn find_experience_years(text: &str) -> Option<f32> {
    RE_YEARS
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<f32>().ok())
        .filter(|years| *years <= 50.0)
        .fold(None, |best: Option<f32>, y| Some(best.map_or(y, |b| b.max(y))))
}

/// Resumes almost always open with the candidate's name on its own line.
pub fn guess_name(text: &str) -> Option<String> {
    let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let words: Vec<&str> = first.split_whitespace().collect();
    let looks_like_name = (2..=4).contains(&words.len())
        && words.iter().all(|w| {
            w.chars()
                .all(|c| c.is_alphabetic() || matches!(c, '.' | '-' | '\''))
        })
        && words
            .iter()
            .all(|w| w.chars().next().is_some_and(char::is_uppercase));
    looks_like_name.then(|| first.to_string())
}

fn education_lines(text: &str) -> Vec<EducationEntry> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.len() <= 160 && RE_DEGREE.is_match(l))
        .take(5)
        .map(|line| EducationEntry {
            degree: Some(line.to_string()),
            institution: None,
            year: RE_YEAR.find(line).map(|m| m.as_str().to_string()),
        })
        .collect()
}

fn certification_lines(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(|l| l.trim().trim_start_matches(['-', '*', '\u{2022}']).trim())
        .filter(|l| !l.is_empty() && l.len() <= 120 && RE_CERTIFICATION.is_match(l))
        .take(10)
        .map(str::to_string)
        .collect()
}

/// Role lines open an entry; the plain lines right after one become its
/// highlights until a heading, degree or certification line ends the block.
fn experience_lines(text: &str) -> Vec<ExperienceEntry> {
    let mut entries: Vec<ExperienceEntry> = Vec::new();
    let mut in_block = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let is_role = line.len() <= 100 && RE_ROLE.is_match(line) && !RE_DEGREE.is_match(line);
        if is_role {
            if entries.len() == MAX_EXPERIENCE_ENTRIES {
                break;
            }
            entries.push(ExperienceEntry {
                title: Some(line.to_string()),
                ..ExperienceEntry::default()
            });
            in_block = true;
            continue;
        }

        let ends_block = is_heading(line)
            || RE_DEGREE.is_match(line)
            || RE_CERTIFICATION.is_match(line)
            || RE_EMAIL.is_match(line);
        if ends_block {
            in_block = false;
            continue;
        }

        if let Some(entry) = entries.last_mut().filter(|_| in_block) {
            if entry.highlights.len() < MAX_HIGHLIGHTS {
                let highlight = line.trim_start_matches(['-', '*', '\u{2022}']).trim();
                entry.highlights.push(highlight.to_string());
            }
        }
    }
    entries
}

/// "EXPERIENCE", "Education:", "Skills"
fn is_heading(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    line.ends_with(':')
        || (line.len() <= 30
            && letters > 0
            && !line.chars().any(|c| c.is_ascii_digit() || c == '.' || c == ',')
            && (line.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
                || SECTION_HEADINGS.contains(&line.to_lowercase().as_str())))
}

/// Best-effort record built from patterns alone.
pub fn extract_candidate(text: &str) -> CandidateRecord {
    CandidateRecord {
        full_name: guess_name(text),
        contact: Contact {
            email: find_email(text),
            phone: find_phone(text),
        },
        experience_years: find_experience_years(text),
        experience: experience_lines(text),
        education: education_lines(text),
        skills: detect_skills(text),
        certifications: certification_lines(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Priya Raman\n\
        priya.raman@example.com | +1 (555) 010-4477\n\
        AI Engineer at Nimbus Labs (2021 - 2024)\n\
        3 years building LLM products with Python, PyTorch and LangChain.\n\
        Deployed services with Docker on AWS.\n\
        B.Tech Computer Science, 2020\n\
        AWS Certified Machine Learning - Specialty";

    #[test]
    fn test_contains_term_respects_word_boundaries() {
        assert!(contains_term("java and rust", "java"));
        assert!(!contains_term("javascript only", "java"));
        assert!(contains_term("modern c++ and c#", "c++"));
        assert!(contains_term("uses node.js daily", "node.js"));
        assert!(!contains_term("trusty", "rust"));
    }

    #[test]
    fn test_detect_skills_uses_canonical_names() {
        let skills = detect_skills("Worked with JS, React.js and k8s");
        assert!(skills.contains("JavaScript"));
        assert!(skills.contains("React"));
        assert!(skills.contains("Kubernetes"));
        assert!(!skills.contains("Java"));
    }

    #[test]
    fn test_canonical_skill() {
        assert_eq!(canonical_skill("pytorch"), Some("PyTorch"));
        assert_eq!(canonical_skill("Python 3"), Some("Python"));
        assert_eq!(canonical_skill("Underwater basket weaving"), None);
    }

    #[test]
    fn test_extract_candidate_from_resume() {
        let record = extract_candidate(RESUME);
        assert_eq!(record.full_name.as_deref(), Some("Priya Raman"));
        assert_eq!(record.contact.email.as_deref(), Some("priya.raman@example.com"));
        assert_eq!(record.contact.phone.as_deref(), Some("+1 (555) 010-4477"));
        assert_eq!(record.experience_years, Some(3.0));
        assert!(record.skills.contains("Python"));
        assert!(record.skills.contains("LangChain"));
        assert!(record.skills.contains("AWS"));
        assert_eq!(record.education.len(), 1);
        assert_eq!(record.education[0].year.as_deref(), Some("2020"));
        assert_eq!(record.certifications.len(), 1);
        assert_eq!(record.experience[0].title.as_deref(), Some("AI Engineer at Nimbus Labs (2021 - 2024)"));
    }

    #[test]
    fn test_work_lines_attach_to_the_role_above() {
        let record = extract_candidate(RESUME);
        assert_eq!(record.experience.len(), 1);
        assert_eq!(
            record.experience[0].highlights,
            vec![
                "3 years building LLM products with Python, PyTorch and LangChain.",
                "Deployed services with Docker on AWS.",
            ]
        );

        let sectioned = extract_candidate(
            "Sam Lee\n\
             EXPERIENCE\n\
             Junior Web Developer at Pixel Studio\n\
             - Built websites with HTML and CSS\n\
             SKILLS\n\
             Python, HTML",
        );
        assert_eq!(
            sectioned.experience[0].highlights,
            vec!["Built websites with HTML and CSS"]
        );
    }

    #[test]
    fn test_year_ranges_are_not_phones() {
        assert_eq!(find_phone("Engineer 2019 - 2021"), None);
    }

    #[test]
    fn test_name_guess_rejects_headings() {
        assert_eq!(guess_name("CURRICULUM vitae 2024\nJane Doe"), None);
        assert_eq!(guess_name("résumé"), None);
        assert_eq!(guess_name(""), None);
    }

    #[test]
    fn test_non_english_text_yields_mostly_empty_record() {
        let record = extract_candidate("これは履歴書です。経験は豊富です。");
        assert!(record.full_name.is_none());
        assert!(record.contact.email.is_none());
        assert!(record.skills.is_empty());
    }
}
