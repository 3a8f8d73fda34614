use bytes::Buf;
use derive_more::Display;
use md5::{Digest, Md5};
use std::cmp::min;
use std::num::Wrapping;

use crate::error::Error;

const C1: Wrapping<i64> = Wrapping(0x87c3_7b91_1142_53d5_u64 as i64);
const C2: Wrapping<i64> = Wrapping(0x4cf5_ad43_2745_937f_u64 as i64);

/// Upper bound of the random partitioner ring - tokens live in `[0, 2^127)`.
const RANDOM_RING_MAX: u128 = (1 << 127) - 1;

/// The hashing scheme mapping partition keys to ring positions. All tokens of
/// one ring come from a single partitioner, so tokens of different families
/// never get compared in practice.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
pub enum Partitioner {
    /// Murmur3-based partitioner with a signed 64-bit ring.
    Murmur3,
    /// MD5-based partitioner with an unsigned 127-bit ring.
    Random,
}

impl Default for Partitioner {
    fn default() -> Self {
        Partitioner::Murmur3
    }
}

impl Partitioner {
    /// Hashes partition key bytes to a token on this partitioner's ring.
    pub fn hash(self, partition_key: &[u8]) -> Token {
        match self {
            Partitioner::Murmur3 => Token::Murmur3(murmur3_hash(partition_key)),
            Partitioner::Random => Token::Random(random_hash(partition_key)),
        }
    }

    /// Parses the textual token representation used by the cluster's system tables.
    pub fn parse_token(self, value: &str) -> Result<Token, Error> {
        match self {
            Partitioner::Murmur3 => value
                .parse()
                .map(Token::Murmur3)
                .map_err(|error| Error::TokenParse(format!("{}: {}", value, error))),
            Partitioner::Random => value
                .parse()
                .map_err(|error| Error::TokenParse(format!("{}: {}", value, error)))
                .and_then(|token| {
                    // the ring only spans [0, 2^127)
                    if token > RANDOM_RING_MAX {
                        Err(Error::TokenParse(format!("{}: outside the ring", value)))
                    } else {
                        Ok(Token::Random(token))
                    }
                }),
        }
    }

    /// The smallest token on this partitioner's ring.
    pub fn min_token(self) -> Token {
        match self {
            Partitioner::Murmur3 => Token::Murmur3(i64::MIN),
            Partitioner::Random => Token::Random(0),
        }
    }
}

/// A token on the ring. Tokens are totally ordered within one partitioner family
/// and the ring wraps - the successor of the ring maximum is the ring minimum.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Display)]
pub enum Token {
    #[display("{_0}")]
    Murmur3(i64),
    #[display("{_0}")]
    Random(u128),
}

impl Token {
    /// Next token on the ring, wrapping at the ring maximum.
    pub fn successor(self) -> Token {
        match self {
            Token::Murmur3(value) if value == i64::MAX => Token::Murmur3(i64::MIN),
            Token::Murmur3(value) => Token::Murmur3(value + 1),
            Token::Random(value) if value >= RANDOM_RING_MAX => Token::Random(0),
            Token::Random(value) => Token::Random(value + 1),
        }
    }

    /// Previous token on the ring, wrapping at the ring minimum.
    pub fn predecessor(self) -> Token {
        match self {
            Token::Murmur3(value) if value == i64::MIN => Token::Murmur3(i64::MAX),
            Token::Murmur3(value) => Token::Murmur3(value - 1),
            Token::Random(0) => Token::Random(RANDOM_RING_MAX),
            Token::Random(value) => Token::Random(value - 1),
        }
    }
}

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token::Murmur3(value)
    }
}

// based on buggy Cassandra implementation
fn murmur3_hash(mut routing_key: &[u8]) -> i64 {
    let length = routing_key.len();

    let mut h1: Wrapping<i64> = Wrapping(0);
    let mut h2: Wrapping<i64> = Wrapping(0);

    while routing_key.len() >= 16 {
        let mut k1 = Wrapping(routing_key.get_i64_le());
        let mut k2 = Wrapping(routing_key.get_i64_le());

        k1 *= C1;
        k1 = rotl64(k1, 31);
        k1 *= C2;
        h1 ^= k1;

        h1 = rotl64(h1, 27);
        h1 += h2;
        h1 = h1 * Wrapping(5) + Wrapping(0x52dce729);

        k2 *= C2;
        k2 = rotl64(k2, 33);
        k2 *= C1;
        h2 ^= k2;

        h2 = rotl64(h2, 31);
        h2 += h1;
        h2 = h2 * Wrapping(5) + Wrapping(0x38495ab5);
    }

    let mut k1 = Wrapping(0_i64);
    let mut k2 = Wrapping(0_i64);

    debug_assert!(routing_key.len() < 16);

    if routing_key.len() > 8 {
        for i in (8..routing_key.len()).rev() {
            k2 ^= Wrapping(routing_key[i] as i8 as i64) << ((i - 8) * 8);
        }

        k2 *= C2;
        k2 = rotl64(k2, 33);
        k2 *= C1;
        h2 ^= k2;
    }

    if !routing_key.is_empty() {
        for i in (0..min(8, routing_key.len())).rev() {
            k1 ^= Wrapping(routing_key[i] as i8 as i64) << (i * 8);
        }

        k1 *= C1;
        k1 = rotl64(k1, 31);
        k1 *= C2;
        h1 ^= k1;
    }

    h1 ^= Wrapping(length as i64);
    h2 ^= Wrapping(length as i64);

    h1 += h2;
    h2 += h1;

    h1 = fmix(h1);
    h2 = fmix(h2);

    h1 += h2;

    h1.0
}

fn random_hash(routing_key: &[u8]) -> u128 {
    let digest = Md5::digest(routing_key);

    let mut bytes = [0; 16];
    bytes.copy_from_slice(&digest);

    // the ring uses the absolute value of the signed 128-bit digest
    i128::from_be_bytes(bytes).wrapping_abs() as u128 & RANDOM_RING_MAX
}

#[inline]
fn rotl64(v: Wrapping<i64>, n: u32) -> Wrapping<i64> {
    Wrapping((v.0 << n) | (v.0 as u64 >> (64 - n)) as i64)
}

#[inline]
fn fmix(mut k: Wrapping<i64>) -> Wrapping<i64> {
    k ^= Wrapping((k.0 as u64 >> 33) as i64);
    k *= Wrapping(0xff51afd7ed558ccd_u64 as i64);
    k ^= Wrapping((k.0 as u64 >> 33) as i64);
    k *= Wrapping(0xc4ceb9fe1a85ec53_u64 as i64);
    k ^= Wrapping((k.0 as u64 >> 33) as i64);

    k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_murmur3_tokens() {
        assert!(Token::Murmur3(-2) < Token::Murmur3(-1));
        assert!(Token::Murmur3(-1) < Token::Murmur3(0));
        assert!(Token::Murmur3(0) < Token::Murmur3(i64::MAX));
    }

    #[test]
    fn should_wrap_successor_at_ring_maximum() {
        assert_eq!(
            Token::Murmur3(i64::MAX).successor(),
            Token::Murmur3(i64::MIN)
        );
        assert_eq!(Token::Murmur3(41).successor(), Token::Murmur3(42));
        assert_eq!(
            Token::Random(RANDOM_RING_MAX).successor(),
            Token::Random(0)
        );
    }

    #[test]
    fn should_wrap_predecessor_at_ring_minimum() {
        assert_eq!(
            Token::Murmur3(i64::MIN).predecessor(),
            Token::Murmur3(i64::MAX)
        );
        assert_eq!(
            Token::Random(0).predecessor(),
            Token::Random(RANDOM_RING_MAX)
        );
    }

    #[test]
    fn should_parse_tokens_per_partitioner() {
        assert_eq!(
            Partitioner::Murmur3.parse_token("-9223372036854775808"),
            Ok(Token::Murmur3(i64::MIN))
        );
        assert_eq!(
            Partitioner::Random.parse_token("170141183460469231731687303715884105727"),
            Ok(Token::Random(RANDOM_RING_MAX))
        );
        assert!(Partitioner::Murmur3.parse_token("not-a-token").is_err());
        assert!(Partitioner::Random.parse_token("-1").is_err());
    }

    #[test]
    fn should_reject_random_tokens_outside_the_ring() {
        // one past the ring maximum
        assert!(Partitioner::Random
            .parse_token("170141183460469231731687303715884105728")
            .is_err());
        assert!(Partitioner::Random.parse_token(&u128::MAX.to_string()).is_err());
    }

    #[test]
    fn should_hash_deterministically() {
        let first = Partitioner::Murmur3.hash(b"some partition key");
        let second = Partitioner::Murmur3.hash(b"some partition key");
        let other = Partitioner::Murmur3.hash(b"another partition key");

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn should_hash_into_the_random_ring() {
        let token = Partitioner::Random.hash(b"some partition key");
        match token {
            Token::Random(value) => assert!(value <= RANDOM_RING_MAX),
            _ => panic!("unexpected token family"),
        }

        assert_eq!(token, Partitioner::Random.hash(b"some partition key"));
    }

    #[test]
    fn should_hash_keys_longer_than_one_block() {
        let long_key = [0x42_u8; 35];
        assert_eq!(
            Partitioner::Murmur3.hash(&long_key),
            Partitioner::Murmur3.hash(&long_key)
        );
        assert_ne!(
            Partitioner::Murmur3.hash(&long_key),
            Partitioner::Murmur3.hash(&long_key[..34])
        );
    }

    #[test]
    fn should_expose_ring_minimum() {
        assert_eq!(Partitioner::Murmur3.min_token(), Token::Murmur3(i64::MIN));
        assert_eq!(Partitioner::Random.min_token(), Token::Random(0));
    }
}
