//! End-to-end scenarios over the public API: search, reconstruct, encode.

use onion_vanity::prefix::{Charset, Matcher};
use onion_vanity::search::offset_to_bytes;
use onion_vanity::tor;
use onion_vanity::{search_parallel, KeyKind, SearchOptions};
use rand::rngs::OsRng;
use rand::RngCore;

fn random_secret_key() -> [u8; 32] {
    let mut secret_key = [0u8; 32];
    OsRng.fill_bytes(&mut secret_key);
    secret_key
}

#[test]
fn vanity_onion_address_end_to_end() {
    let secret_key = random_secret_key();
    let public_key = tor::public_key_for(&secret_key);

    let matcher = Matcher::new(&["al"], Charset::Onion).unwrap();
    let options = SearchOptions {
        batch_size: 256,
        ..SearchOptions::default()
    };
    let (discovery, attempts) = search_parallel(&public_key, &matcher, &options).unwrap();
    let discovery = discovery.expect("a 10-bit prefix is found quickly");
    assert!(attempts > 0);

    let vanity_secret_key = tor::add_offset(&secret_key, &offset_to_bytes(discovery.offset));
    let vanity_public_key = tor::public_key_for(&vanity_secret_key);
    let hostname = tor::encode_onion_address(&vanity_public_key);
    assert!(hostname.starts_with("al"), "hostname {hostname}");

    // The derived public key agrees with the candidate up to the x-sign.
    let mut masked = vanity_public_key;
    masked[31] &= 0x7f;
    assert_eq!(masked, discovery.public_key);
}

#[test]
fn multiple_prefixes_report_the_longest() {
    let secret_key = random_secret_key();
    let public_key = tor::public_key_for(&secret_key);

    let matcher = Matcher::new(&["q", "qq", "x"], Charset::Onion).unwrap();
    let options = SearchOptions {
        batch_size: 256,
        ..SearchOptions::default()
    };
    let (discovery, _) = search_parallel(&public_key, &matcher, &options).unwrap();
    let discovery = discovery.expect("a 5-bit disjunction is found quickly");

    let vanity_secret_key = tor::add_offset(&secret_key, &offset_to_bytes(discovery.offset));
    let hostname = tor::encode_onion_address(&tor::public_key_for(&vanity_secret_key));

    let longest = matcher.longest_match(&hostname).expect("one prefix matched");
    assert!(hostname.starts_with(longest));
    if hostname.starts_with("qq") {
        assert_eq!(longest, "qq");
    }
}

#[test]
fn client_authorization_end_to_end() {
    let secret_key = random_secret_key();
    let public_key = tor::public_key_for(&secret_key);

    let matcher = Matcher::new(&["LE"], Charset::Client).unwrap();
    let options = SearchOptions {
        kind: KeyKind::Client,
        batch_size: 256,
        ..SearchOptions::default()
    };
    let (discovery, _) = search_parallel(&public_key, &matcher, &options).unwrap();
    let discovery = discovery.expect("a 10-bit prefix is found quickly");

    let vanity_secret_key = tor::add_offset(&secret_key, &offset_to_bytes(discovery.offset));
    let vanity_public_key = tor::client_public_key_for(&vanity_secret_key);

    // Montgomery u-coordinates carry no sign, so the match is exact.
    assert_eq!(vanity_public_key, discovery.public_key);
    assert!(tor::encode_client_key(&vanity_public_key).starts_with("LE"));
}

#[test]
fn reported_offsets_apply_deterministically() {
    let secret_key = random_secret_key();
    let public_key = tor::public_key_for(&secret_key);

    // Search knowing only the public key, as an outsourced search would.
    let matcher = Matcher::new(&["b"], Charset::Onion).unwrap();
    let options = SearchOptions {
        batch_size: 256,
        ..SearchOptions::default()
    };
    let (discovery, _) = search_parallel(&public_key, &matcher, &options).unwrap();
    let discovery = discovery.expect("a 5-bit prefix is found quickly");

    // Applying the reported offset is pure arithmetic: same inputs, same
    // key pair, and the key survives its file envelope.
    let offset = offset_to_bytes(discovery.offset);
    let first = tor::add_offset(&secret_key, &offset);
    let second = tor::add_offset(&secret_key, &offset);
    assert_eq!(first, second);

    let vanity_public_key = tor::public_key_for(&first);
    assert!(tor::encode_onion_address(&vanity_public_key).starts_with('b'));

    let stored = tor::parse_secret_key_file(&tor::encode_secret_key_file(&first)).unwrap();
    assert_eq!(tor::public_key_for(&stored), vanity_public_key);
}
