//! Network-facing collaborators: OAuth1 signing, the authenticated API
//! client, the shared lag coordinator, and the redirect resolver.

pub mod lag;
pub mod oauth;
pub mod redirect;
pub mod wikidata;
