// Validation check keys
// Stable identifiers attached to every check a validation run records

pub mod trust_anchor {
    pub const PUBLIC_KEY_MATCH: &str = "TRUST_ANCHOR_PUBLIC_KEY_MATCH";
    pub const CERTIFICATE_MISSING: &str = "TRUST_ANCHOR_CERTIFICATE_MISSING";
    pub const CERTIFICATE_AMBIGUOUS: &str = "TRUST_ANCHOR_CERTIFICATE_AMBIGUOUS";
    pub const NOT_RESOURCE_CERTIFICATE: &str = "TRUST_ANCHOR_NOT_RESOURCE_CERTIFICATE";
}

pub mod repository {
    pub const FETCH: &str = "REPOSITORY_FETCH";
}
