use std::sync::OnceLock;

use regex::Regex;

/// Keywords that mark the sentence carrying a usable meeting title, in priority order.
pub const TITLE_KEYWORDS: &[&str] = &["회의", "미팅", "회의실", "논의", "상의", "업무", "팀"];

/// Markers that turn a preceding integer into a head count, in priority order.
const CAPACITY_PATTERNS: &[&str] = &[r"(\d+)명", r"(\d+)인", r"(\d+)people"];

const EMAIL_TOKEN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const EMAIL_EXACT: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// Best-effort guesses pulled out of an opening request. Times are never guessed here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub min_capacity: Option<u32>,
    pub organizer: Option<String>,
    pub participants: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct FieldExtractor {
    title_max_chars: usize,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_MAX_CHARS)
    }
}

impl FieldExtractor {
    pub fn new(title_max_chars: usize) -> Self {
        Self { title_max_chars: title_max_chars.max(1) }
    }

    pub fn extract(&self, text: &str) -> ExtractedFields {
        let emails = extract_emails(text);
        let mut emails = emails.into_iter();
        let organizer = emails.next();
        let rest = emails.collect::<Vec<_>>();

        ExtractedFields {
            title: self.extract_title(text),
            min_capacity: extract_capacity(text),
            organizer,
            participants: (!rest.is_empty()).then_some(rest),
        }
    }

    fn extract_title(&self, text: &str) -> Option<String> {
        let keyword = TITLE_KEYWORDS.iter().find(|keyword| text.contains(*keyword))?;
        let sentence = text.split('.').find(|sentence| sentence.contains(keyword))?;
        let title = sentence.trim().chars().take(self.title_max_chars).collect::<String>();
        (!title.is_empty()).then_some(title)
    }
}

fn capacity_regexes() -> &'static [Regex] {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED
        .get_or_init(|| CAPACITY_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect())
}

fn email_token_regex() -> Option<&'static Regex> {
    static COMPILED: OnceLock<Option<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| Regex::new(EMAIL_TOKEN).ok()).as_ref()
}

fn email_exact_regex() -> Option<&'static Regex> {
    static COMPILED: OnceLock<Option<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| Regex::new(EMAIL_EXACT).ok()).as_ref()
}

fn extract_capacity(text: &str) -> Option<u32> {
    capacity_regexes().iter().find_map(|regex| {
        let captures = regex.captures(text)?;
        captures.get(1)?.as_str().parse::<u32>().ok().filter(|count| *count > 0)
    })
}

pub fn extract_emails(text: &str) -> Vec<String> {
    email_token_regex()
        .map(|regex| regex.find_iter(text).map(|found| found.as_str().to_string()).collect())
        .unwrap_or_default()
}

pub fn is_valid_email(candidate: &str) -> bool {
    email_exact_regex().map(|regex| regex.is_match(candidate)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{extract_emails, is_valid_email, ExtractedFields, FieldExtractor};

    #[test]
    fn opening_request_yields_people_and_capacity() {
        let extracted = FieldExtractor::default().extract("내일 2시 팀 회의, 6명, alice@x.com, bob@x.com");

        assert_eq!(extracted.organizer.as_deref(), Some("alice@x.com"));
        assert_eq!(extracted.participants, Some(vec!["bob@x.com".to_string()]));
        assert_eq!(extracted.min_capacity, Some(6));
        assert!(extracted.title.as_deref().is_some_and(|title| title.contains("회의")));
    }

    #[test]
    fn title_is_the_sentence_holding_the_first_listed_keyword() {
        let extracted = FieldExtractor::default()
            .extract("안녕하세요. 분기 실적 미팅 잡아주세요. 팀원들이 참석합니다");

        // "미팅" precedes "팀" in the keyword list even though "팀" also appears.
        assert_eq!(extracted.title.as_deref(), Some("분기 실적 미팅 잡아주세요"));
    }

    #[test]
    fn title_is_truncated_by_characters() {
        let long = format!("{}회의", "가".repeat(80));
        let extracted = FieldExtractor::new(10).extract(&long);

        assert_eq!(extracted.title.map(|title| title.chars().count()), Some(10));
    }

    #[test]
    fn absent_patterns_leave_fields_unset() {
        assert_eq!(FieldExtractor::default().extract("hello there"), ExtractedFields::default());
    }

    #[test]
    fn single_address_sets_only_the_organizer() {
        let extracted = FieldExtractor::default().extract("book something for carol@corp.io");
        assert_eq!(extracted.organizer.as_deref(), Some("carol@corp.io"));
        assert_eq!(extracted.participants, None);
    }

    #[test]
    fn capacity_markers_are_tried_in_order() {
        assert_eq!(FieldExtractor::default().extract("4인 회의실, 10명").min_capacity, Some(10));
        assert_eq!(FieldExtractor::default().extract("room for 3people").min_capacity, Some(3));
        assert_eq!(FieldExtractor::default().extract("0명").min_capacity, None);
    }

    #[test]
    fn email_validation_requires_whole_token() {
        assert!(is_valid_email("alice@x.com"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("alice@x.com, bob@x.com"));
        assert_eq!(extract_emails("a@b.co; c@d.org"), vec!["a@b.co", "c@d.org"]);
    }
}
