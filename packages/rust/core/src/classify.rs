//! Buyer-group role classification.
//!
//! Ordered rules, first match wins. Pure: the same candidate always yields
//! the same assignment, and channel verification plays no part.

use std::collections::BTreeSet;

use prospector_shared::{BuyerRole, Candidate, RoleAssignment};

const DECISION_TITLES: &[&str] = &[
    "ceo", "cfo", "coo", "cto", "cio", "cmo", "cro", "ciso", "chief", "president", "founder",
    "vp", "svp", "evp", "vice president", "director", "head of",
];

const TECHNICAL_TITLES: &[&str] = &[
    "engineer", "engineering", "developer", "architect", "technical", "technology", "software",
    "platform", "infrastructure", "devops", "data", "product", "security engineer",
];

const TECHNICAL_DEPARTMENTS: &[&str] = &[
    "engineering", "product", "it", "technology", "research", "r d", "data",
];

const COMMERCIAL_TITLES: &[&str] = &[
    "sales", "marketing", "business development", "account executive", "account manager",
    "revenue", "growth", "bdr", "sdr",
];

const GATEKEEPER_TITLES: &[&str] = &[
    "legal", "counsel", "attorney", "compliance", "procurement", "purchasing", "security",
    "privacy", "risk",
];

const CONNECTOR_TITLES: &[&str] = &[
    "partnership", "partnerships", "alliance", "alliances", "relationship", "relationships",
];

/// Lowercase, punctuation to spaces, padded so `" vp "` only matches a word.
fn padded(s: &str) -> String {
    let words: Vec<String> = s
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    format!(" {} ", words.join(" "))
}

fn first_match(haystack: &str, patterns: &[&'static str]) -> Option<&'static str> {
    patterns
        .iter()
        .copied()
        .find(|p| haystack.contains(&format!(" {p} ")))
}

fn assignment(
    candidate: &Candidate,
    role: BuyerRole,
    confidence: u8,
    tags: impl IntoIterator<Item = String>,
) -> RoleAssignment {
    RoleAssignment {
        candidate_id: candidate.id.clone(),
        role,
        confidence,
        reasoning_tags: tags.into_iter().collect::<BTreeSet<_>>(),
    }
}

/// Assign exactly one buyer-group role.
pub fn classify(candidate: &Candidate) -> RoleAssignment {
    let title = padded(&candidate.title);
    let department = candidate.department.as_deref().map(padded);

    if candidate.is_decision_maker {
        return assignment(
            candidate,
            BuyerRole::DecisionMaker,
            95,
            ["provider_decision_maker_flag".to_string()],
        );
    }

    if let Some(p) = first_match(&title, DECISION_TITLES) {
        return assignment(candidate, BuyerRole::DecisionMaker, 90, [format!("title:{p}")]);
    }

    if let Some(p) = first_match(&title, TECHNICAL_TITLES) {
        // Without a department, the title itself has to name the function.
        let dept_hit = match &department {
            Some(d) => first_match(d, TECHNICAL_DEPARTMENTS),
            None => first_match(&title, TECHNICAL_DEPARTMENTS),
        };
        if let Some(d) = dept_hit {
            return assignment(
                candidate,
                BuyerRole::Champion,
                80,
                [format!("title:{p}"), format!("department:{d}")],
            );
        }
    }

    if let Some(p) = first_match(&title, COMMERCIAL_TITLES) {
        return assignment(candidate, BuyerRole::Stakeholder, 70, [format!("title:{p}")]);
    }

    if let Some(p) = first_match(&title, GATEKEEPER_TITLES) {
        return assignment(candidate, BuyerRole::Blocker, 60, [format!("title:{p}")]);
    }

    if let Some(p) = first_match(&title, CONNECTOR_TITLES) {
        return assignment(candidate, BuyerRole::Introducer, 60, [format!("title:{p}")]);
    }

    assignment(candidate, BuyerRole::Stakeholder, 50, ["default".to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candidate;

    fn with_dept(title: &str, dept: &str) -> Candidate {
        let mut c = candidate("x", "Pat Q", title, false);
        c.department = Some(dept.into());
        c
    }

    fn role(c: &Candidate) -> (BuyerRole, u8) {
        let r = classify(c);
        (r.role, r.confidence)
    }

    #[test]
    fn provider_flag_wins() {
        let c = candidate("j", "Jane Doe", "CFO", true);
        let r = classify(&c);
        assert_eq!((r.role, r.confidence), (BuyerRole::DecisionMaker, 95));
        assert_eq!(r.candidate_id, "j");
        assert!(r.reasoning_tags.contains("provider_decision_maker_flag"));

        // Even a title that would otherwise be a blocker.
        let c = candidate("k", "Kim", "General Counsel", true);
        assert_eq!(role(&c), (BuyerRole::DecisionMaker, 95));
    }

    #[test]
    fn vp_in_engineering_is_a_decision_maker() {
        let c = with_dept("VP Engineering", "Engineering");
        assert_eq!(role(&c), (BuyerRole::DecisionMaker, 90));
        let c = with_dept("Director of Platform Engineering", "Engineering");
        assert_eq!(role(&c), (BuyerRole::DecisionMaker, 90));
    }

    #[test]
    fn rule_table() {
        let cases = [
            (with_dept("Senior Software Engineer", "Engineering"), BuyerRole::Champion, 80),
            (with_dept("Product Manager", "Product"), BuyerRole::Champion, 80),
            (with_dept("Account Executive", "Sales"), BuyerRole::Stakeholder, 70),
            (with_dept("Business Development Manager", "Sales"), BuyerRole::Stakeholder, 70),
            (with_dept("Procurement Specialist", "Finance"), BuyerRole::Blocker, 60),
            (with_dept("Compliance Officer", "Legal"), BuyerRole::Blocker, 60),
            (with_dept("Strategic Alliances Lead", "Corporate"), BuyerRole::Introducer, 60),
            (with_dept("Office Coordinator", "Operations"), BuyerRole::Stakeholder, 50),
        ];
        for (c, expected, conf) in cases {
            assert_eq!(role(&c), (expected, conf), "title {:?}", c.title);
        }
    }

    #[test]
    fn technical_title_outside_engineering_is_not_a_champion() {
        let c = with_dept("Data Entry Clerk", "Operations");
        assert_eq!(role(&c), (BuyerRole::Stakeholder, 50));
    }

    #[test]
    fn patterns_match_whole_words() {
        // "vp" must not match inside another word, "cto" not inside "director".
        let c = with_dept("Event Planner", "Marketing Ops");
        assert_eq!(role(&c).0, BuyerRole::Stakeholder);
        assert_eq!(role(&c).1, 50);
        let c = with_dept("Contractor", "Facilities");
        assert_eq!(role(&c), (BuyerRole::Stakeholder, 50));
    }

    #[test]
    fn classification_is_idempotent() {
        let inputs = [
            candidate("a", "A", "Chief Technology Officer", false),
            with_dept("Staff Engineer", "Engineering"),
            with_dept("Head of Security", "Security"),
            with_dept("Partnerships Manager", "BD"),
        ];
        for c in &inputs {
            let first = classify(c);
            for _ in 0..3 {
                assert_eq!(classify(c), first);
            }
        }
    }
}
