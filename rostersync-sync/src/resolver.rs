//! Identity resolution: map a roster email to an identity id.
//!
//! The service offers no lookup by email, so the full identity list is read
//! page by page and scanned. Listing stops at the first page shorter than the
//! page size.

use rostersync_client::{ClientResult, IdentityService};
use rostersync_core::types::{Email, EmailMatch, Identity};

/// Result of looking up one roster email.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Identity),
    Missing,
}

impl Resolution {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Resolution::Found(identity) => Some(identity),
            Resolution::Missing => None,
        }
    }
}

/// Read every identity, one page at a time. Pages are numbered from 1.
pub fn list_all<S>(service: &S, page_size: u32) -> ClientResult<Vec<Identity>>
where
    S: IdentityService + ?Sized,
{
    let per_page = page_size.max(1);
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = service.list_identities(page, per_page)?;
        let len = batch.len();
        all.extend(batch);
        if len < per_page as usize {
            break;
        }
        page += 1;
    }
    tracing::debug!("listed {} identities over {} page(s)", all.len(), page);
    Ok(all)
}

/// Find the identity whose email matches `email` under `mode`.
///
/// The first match in listing order wins.
pub fn find<'a>(
    identities: &'a [Identity],
    email: &Email,
    mode: EmailMatch,
) -> Option<&'a Identity> {
    identities
        .iter()
        .find(|identity| email.matches(&identity.email, mode))
}

/// List identities and look up one email.
pub fn resolve<S>(
    service: &S,
    email: &Email,
    mode: EmailMatch,
    page_size: u32,
) -> ClientResult<Resolution>
where
    S: IdentityService + ?Sized,
{
    let identities = list_all(service, page_size)?;
    Ok(match find(&identities, email, mode) {
        Some(identity) => Resolution::Found(identity.clone()),
        None => Resolution::Missing,
    })
}

#[cfg(test)]
mod tests {
    use rostersync_client::{Call, MemoryBackend};

    use super::*;

    fn backend_with(n: usize) -> MemoryBackend {
        let backend = MemoryBackend::new();
        for i in 0..n {
            backend.add_identity(&format!("user{i}@x.com"), "pw");
        }
        backend
    }

    #[test]
    fn pages_until_short_page() {
        let backend = backend_with(5);
        let all = list_all(&backend, 2).expect("list");
        assert_eq!(all.len(), 5);
        let pages: Vec<u32> = backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ListIdentities { page } => Some(page),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn exact_multiple_reads_one_empty_page() {
        let backend = backend_with(4);
        let all = list_all(&backend, 2).expect("list");
        assert_eq!(all.len(), 4);
        assert_eq!(backend.calls().len(), 3);
    }

    #[test]
    fn match_mode_decides_case_handling() {
        let backend = MemoryBackend::new();
        backend.add_identity("Anna@X.com", "pw");
        let email = Email::from("anna@x.com");

        let exact = resolve(&backend, &email, EmailMatch::Exact, 100).expect("resolve");
        assert_eq!(exact, Resolution::Missing);

        let loose = resolve(&backend, &email, EmailMatch::CaseInsensitive, 100).expect("resolve");
        assert_eq!(
            loose.identity().map(|identity| identity.email.as_str()),
            Some("Anna@X.com")
        );
    }
}
