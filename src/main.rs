//! Command-line interface for the vanity key search.

use std::io::Read;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use onion_vanity::prefix::{Charset, Matcher};
use onion_vanity::search::offset_to_bytes;
use onion_vanity::tor;
use onion_vanity::worker::{search_parallel, SearchOptions, DEFAULT_BATCH_SIZE};
use onion_vanity::{Error, KeyKind};

/// Generate a hidden service key pair whose onion address starts with one
/// of the given prefixes, or a client authorization key pair with
/// `--client`.
///
/// With `--from`, the search starts from an existing public key and
/// reports the offset to the matching key instead of a secret key; the
/// holder of the secret key applies the offset with `--offset`.  This
/// allows outsourcing the search without revealing the secret key.
#[derive(Parser)]
#[command(name = "onion-vanity", version, about)]
struct Args {
    /// Base32 prefixes to search for; finding any one of them wins
    #[arg(
        value_name = "PREFIX",
        required_unless_present = "offset",
        conflicts_with = "offset"
    )]
    prefixes: Vec<String>,

    /// Start the search from a base64-encoded hs_ed25519_public_key and
    /// report an offset instead of a key pair
    #[arg(long, value_name = "PUBLIC_KEY", conflicts_with_all = ["offset", "client"])]
    from: Option<String>,

    /// Add a base64-encoded offset to the secret key read from standard
    /// input and print the resulting key pair
    #[arg(long, value_name = "OFFSET")]
    offset: Option<String>,

    /// Stop after the specified timeout (e.g. 10s, 5m, 1h)
    #[arg(long, value_name = "TIMEOUT", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Search for a client authorization key (uppercase base32) instead
    /// of an onion address
    #[arg(long)]
    client: bool,

    /// Candidates tested per batch in each worker
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Worker threads; defaults to the available parallelism
    #[arg(long, value_name = "COUNT")]
    threads: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::init();

    // clap exits with status 2 on usage errors by default, but 2 is
    // reserved for an exhausted search.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    if let Some(offset) = &args.offset {
        return apply_offset(offset, args.client);
    }

    let charset = if args.client {
        Charset::Client
    } else {
        Charset::Onion
    };
    let prefixes: Vec<String> = args.prefixes.iter().map(|p| charset.normalize(p)).collect();
    let matcher = Matcher::new(&prefixes, charset)?;

    let (start_secret_key, start_public_key) = match &args.from {
        Some(from) => {
            let decoded = BASE64
                .decode(from.trim())
                .map_err(|_| Error::InvalidPublicKey)
                .context("decoding --from")?;
            (None, tor::parse_public_key_file(&decoded)?)
        }
        None => {
            let mut secret_key = [0u8; 32];
            OsRng.fill_bytes(&mut secret_key);
            let public_key = tor::public_key_for(&secret_key);
            (Some(secret_key), public_key)
        }
    };

    let options = SearchOptions {
        kind: if args.client {
            KeyKind::Client
        } else {
            KeyKind::Service
        },
        batch_size: args.batch_size,
        workers: args.threads,
        timeout: args.timeout,
    };

    let started = Instant::now();
    let (discovery, attempts) = search_parallel(&start_public_key, &matcher, &options)?;
    let elapsed = started.elapsed();
    let rate = attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let elapsed_round = humantime::format_duration(Duration::from_secs(elapsed.as_secs().max(1)));

    let Some(discovery) = discovery else {
        eprintln!(
            "Stopped searching after {elapsed_round} and {attempts} attempts ({rate:.0} attempts/s)"
        );
        return Ok(ExitCode::from(2));
    };

    match start_secret_key {
        Some(mut secret_key) => {
            let mut vanity_secret_key =
                tor::add_offset(&secret_key, &offset_to_bytes(discovery.offset));
            secret_key.zeroize();

            if args.client {
                let vanity_public_key = tor::client_public_key_for(&vanity_secret_key);
                let encoded = tor::encode_client_key(&vanity_public_key);
                report_found(&matcher, &encoded, elapsed, attempts);

                println!("---");
                println!("public_key: {encoded}");
                println!("secret_key: {}", tor::encode_client_key(&vanity_secret_key));
            } else {
                let vanity_public_key = tor::public_key_for(&vanity_secret_key);
                let hostname = tor::encode_onion_address(&vanity_public_key);
                report_found(&matcher, &hostname, elapsed, attempts);

                println!("---");
                println!("{}: {hostname}", tor::HOSTNAME_FILE_NAME);
                println!(
                    "{}: {}",
                    tor::PUBLIC_KEY_FILE_NAME,
                    BASE64.encode(tor::encode_public_key_file(&vanity_public_key))
                );
                println!(
                    "{}: {}",
                    tor::SECRET_KEY_FILE_NAME,
                    BASE64.encode(tor::encode_secret_key_file(&vanity_secret_key))
                );
            }
            vanity_secret_key.zeroize();
        }
        None => {
            // Searching from --from: the candidate carries no x-sign, so
            // the reported hostname can differ from the final one after
            // its prefix; the offset is what matters.
            let hostname = tor::encode_onion_address(&discovery.public_key);
            report_found(&matcher, &hostname, elapsed, attempts);

            println!("---");
            println!("{}: {hostname}", tor::HOSTNAME_FILE_NAME);
            println!("offset: {}", BASE64.encode(minimal_le_bytes(discovery.offset)));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn report_found(matcher: &Matcher, encoded: &str, elapsed: Duration, attempts: u64) {
    let prefix = matcher.longest_match(encoded).unwrap_or_default();
    let rate = attempts as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let elapsed_round = humantime::format_duration(Duration::from_secs(elapsed.as_secs()));
    eprintln!("Found {prefix}... in {elapsed_round} after {attempts} attempts ({rate:.0} attempts/s)");
}

/// Apply `--offset` to a secret key read from standard input.
fn apply_offset(offset_base64: &str, client: bool) -> Result<ExitCode> {
    let offset = decode_offset(offset_base64)?;

    let mut input = String::new();
    std::io::stdin()
        .take(SECRET_KEY_STDIN_LIMIT as u64 + 16)
        .read_to_string(&mut input)
        .context("reading secret key from standard input")?;
    let input = input.trim();

    if client {
        let mut secret_key = tor::decode_client_key(input)?;
        let vanity_secret_key = tor::add_offset(&secret_key, &offset);
        secret_key.zeroize();

        println!("---");
        println!(
            "public_key: {}",
            tor::encode_client_key(&tor::client_public_key_for(&vanity_secret_key))
        );
        println!("secret_key: {}", tor::encode_client_key(&vanity_secret_key));
    } else {
        let decoded = BASE64
            .decode(input)
            .map_err(|_| Error::InvalidSecretKey)
            .context("decoding secret key")?;
        let mut secret_key = tor::parse_secret_key_file(&decoded)?;
        let vanity_secret_key = tor::add_offset(&secret_key, &offset);
        secret_key.zeroize();

        let vanity_public_key = tor::public_key_for(&vanity_secret_key);
        println!("---");
        println!(
            "{}: {}",
            tor::HOSTNAME_FILE_NAME,
            tor::encode_onion_address(&vanity_public_key)
        );
        println!(
            "{}: {}",
            tor::PUBLIC_KEY_FILE_NAME,
            BASE64.encode(tor::encode_public_key_file(&vanity_public_key))
        );
        println!(
            "{}: {}",
            tor::SECRET_KEY_FILE_NAME,
            BASE64.encode(tor::encode_secret_key_file(&vanity_secret_key))
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Enough for the base64 encoding of an `hs_ed25519_secret_key` file.
const SECRET_KEY_STDIN_LIMIT: usize = tor::SECRET_KEY_FILE_LEN.div_ceil(3) * 4;

/// Decode a base64, little-endian offset into a 32-byte scalar.
fn decode_offset(s: &str) -> Result<[u8; 32]> {
    let bytes = BASE64.decode(s.trim()).map_err(|_| Error::InvalidOffset)?;
    if bytes.len() > 32 {
        bail!(Error::InvalidOffset);
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(out)
}

/// The shortest little-endian encoding of an offset.
fn minimal_le_bytes(offset: u128) -> Vec<u8> {
    let bytes = offset.to_le_bytes();
    let end = bytes.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
    bytes[..end].to_vec()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minimal_le_bytes_trims_trailing_zeros() {
        assert_eq!(minimal_le_bytes(0), vec![0]);
        assert_eq!(minimal_le_bytes(1), vec![1]);
        assert_eq!(minimal_le_bytes(0x0102), vec![2, 1]);
        assert_eq!(minimal_le_bytes(1 << 64), vec![0, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn offsets_round_trip_through_base64() {
        for offset in [0u128, 1, 0xdead_beef, u64::MAX as u128 + 17] {
            let encoded = BASE64.encode(minimal_le_bytes(offset));
            let decoded = decode_offset(&encoded).unwrap();
            assert_eq!(decoded, offset_to_bytes(offset));
        }
    }

    #[test]
    fn rejects_oversized_offsets() {
        let encoded = BASE64.encode([1u8; 33]);
        assert!(decode_offset(&encoded).is_err());
    }
}
