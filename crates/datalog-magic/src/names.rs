//! Naming conventions of the rewriting passes
//!
//! Bookkeeping is encoded in qualified-name segments so it survives
//! round-tripping through later representations: a leading `@neglabel` or
//! `@poscopy_<k>` segment marks labelled copies, a leading `@magic` marks
//! demand predicates, and a trailing `{bf...}` segment carries an
//! adornment.

use datalog_ast::QualifiedName;

pub(crate) const NEGATIVE_LABEL: &str = "@neglabel";
pub(crate) const MAGIC_PREFIX: &str = "@magic";

pub(crate) fn negative_label(name: &QualifiedName) -> QualifiedName {
    name.prepended(NEGATIVE_LABEL)
}

pub(crate) fn is_negatively_labelled(name: &QualifiedName) -> bool {
    name.first().as_ref() == NEGATIVE_LABEL
}

pub(crate) fn positive_copy(name: &QualifiedName, copy: usize) -> QualifiedName {
    name.prepended(format!("@poscopy_{}", copy))
}

pub(crate) fn is_positively_labelled(name: &QualifiedName) -> bool {
    name.first().as_ref().starts_with("@poscopy_")
}

pub(crate) fn is_magic(name: &QualifiedName) -> bool {
    name.first().as_ref() == MAGIC_PREFIX
}

/// `name` with the adornment marker attached; the empty marker is the
/// identity (unadorned relations keep their name)
pub(crate) fn adornment_id(name: &QualifiedName, marker: &str) -> QualifiedName {
    if marker.is_empty() {
        name.clone()
    } else {
        name.appended(format!("{{{}}}", marker))
    }
}

/// The adornment marker encoded in the name, if any
pub(crate) fn adornment_of(name: &QualifiedName) -> Option<String> {
    let last = name.last();
    let last = last.as_ref();
    if name.segments().len() < 2 || !last.starts_with('{') || !last.ends_with('}') {
        return None;
    }
    let marker = &last[1..last.len() - 1];
    debug_assert!(
        marker.chars().all(|c| c == 'b' || c == 'f'),
        "malformed adornment marker {last}"
    );
    Some(marker.to_string())
}

pub(crate) fn magic_name(name: &QualifiedName) -> QualifiedName {
    name.prepended(MAGIC_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adornment_round_trip() {
        let name = QualifiedName::from("path");
        let adorned = adornment_id(&name, "bf");
        assert_eq!(adorned.to_string(), "path.{bf}");
        assert_eq!(adornment_of(&adorned), Some("bf".to_string()));
        assert_eq!(adornment_of(&name), None);
        assert_eq!(adornment_id(&name, ""), name);
    }

    #[test]
    fn test_labels() {
        let name = QualifiedName::from("p");
        assert!(is_negatively_labelled(&negative_label(&name)));
        assert!(!is_negatively_labelled(&name));
        assert_eq!(positive_copy(&name, 2).to_string(), "@poscopy_2.p");
        assert_eq!(magic_name(&adornment_id(&name, "bf")).to_string(), "@magic.p.{bf}");
    }

    #[test]
    fn test_zero_arity_adornment() {
        // A zero-arity relation's adornment is the empty marker.
        let name = QualifiedName::from("flag");
        assert_eq!(adornment_id(&name, ""), name);
        assert_eq!(adornment_of(&name), None);
    }
}
