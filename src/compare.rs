//! Equality policy: classify one present entry against the reference entry
//!
//! Every check compares against the same reference entry, and each check is
//! an equality on a single attribute. So entries judged `Same` are also
//! pairwise equal to each other, not just to the reference.

use crate::cancel::CancellationToken;
use crate::config::{EqualityPolicy, ReconcileOptions};
use crate::types::{DiffReason, Entry, EntryKind, Verdict};
use tracing::trace;

/// Outcome of comparing one entry against the reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Verdict for the compared entry
    pub verdict: Verdict,
    /// Set when the reference entry itself could not be read
    pub reference_error: Option<String>,
}

impl Comparison {
    fn verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            reference_error: None,
        }
    }
}

/// Compare `other` against `reference` under `options.equality`
///
/// Content digests are only computed when the policy is `Content`, both
/// sides are files and their sizes agree. A digest is cached on its entry, so
/// the reference is read once however many roots compare against it.
pub fn classify(
    reference: &Entry,
    other: &Entry,
    options: &ReconcileOptions,
    cancel: &CancellationToken,
) -> Comparison {
    if let Some(error) = &other.error {
        return Comparison::verdict(Verdict::Unreadable(error.clone()));
    }

    if reference.kind != other.kind {
        return Comparison::verdict(Verdict::Different(vec![DiffReason::Kind]));
    }

    if options.equality == EqualityPolicy::Existence {
        return Comparison::verdict(Verdict::Same);
    }

    let mut reasons = Vec::new();

    match reference.kind {
        EntryKind::File => match options.equality {
            EqualityPolicy::SizeAndTime => {
                if reference.size != other.size {
                    reasons.push(DiffReason::Size);
                }
                if reference.modified != other.modified {
                    reasons.push(DiffReason::ModTime);
                }
            }
            EqualityPolicy::Content => {
                if reference.size != other.size {
                    reasons.push(DiffReason::Size);
                    reasons.push(DiffReason::Content);
                } else {
                    if cancel.is_cancelled() {
                        return Comparison::verdict(Verdict::Unreadable(
                            "cancelled before content was compared".to_string(),
                        ));
                    }
                    match (reference.content_digest(), other.content_digest()) {
                        (Ok(a), Ok(b)) => {
                            if a != b {
                                reasons.push(DiffReason::Content);
                            }
                        }
                        (Err(e), _) => {
                            return Comparison {
                                verdict: Verdict::Unreadable(format!("reference unreadable: {}", e)),
                                reference_error: Some(e),
                            };
                        }
                        (_, Err(e)) => return Comparison::verdict(Verdict::Unreadable(e)),
                    }
                }
            }
            EqualityPolicy::Existence => {}
        },
        EntryKind::Symlink => {
            if reference.link_target != other.link_target {
                reasons.push(DiffReason::LinkTarget);
            }
        }
        EntryKind::Directory | EntryKind::Other => {}
    }

    if options.compare_permissions && reference.permissions != other.permissions {
        reasons.push(DiffReason::Permissions);
    }

    reasons.sort();
    trace!("Classified {:?}: {:?}", other.path, reasons);

    if reasons.is_empty() {
        Comparison::verdict(Verdict::Same)
    } else {
        Comparison::verdict(Verdict::Different(reasons))
    }
}
