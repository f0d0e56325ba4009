//! Address selection for discovered peers.
//!
//! Preference order:
//! 1. the peer's self-reported local address (same private network assumed,
//!    not verified)
//! 2. the public address the server observed
//! 3. nothing: the peer is skipped

use syncmesh_common::api::ClientSnapshot;

/// Pick the single address to dial for `peer`, or `None` if it has no usable one.
pub fn pick_peer_address(peer: &ClientSnapshot) -> Option<String> {
    let local = peer.local_address();
    if local.is_usable() {
        return Some(local.to_string());
    }
    let public = peer.public_address();
    if public.is_usable() {
        return Some(public.to_string());
    }
    None
}

/// Dial candidates in discovery order as `(client_id, address)`.
///
/// Our own record and peers without a usable address are left out.
pub fn candidates<'a>(
    peers: &'a [ClientSnapshot],
    self_id: &'a str,
) -> impl Iterator<Item = (&'a str, String)> + 'a {
    peers
        .iter()
        .filter(move |peer| peer.client_id != self_id)
        .filter_map(|peer| pick_peer_address(peer).map(|addr| (peer.client_id.as_str(), addr)))
}
