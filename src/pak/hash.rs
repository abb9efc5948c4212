#![forbid(unsafe_code)]

//! CityHash64 (v1.1), the content hash hashfs archives key their entries by.

const K0: u64 = 0xc3a5_c85c_97cb_3127;
const K1: u64 = 0xb492_b66f_be98_f273;
const K2: u64 = 0x9ae1_6a3b_2f90_404f;
const K_MUL: u64 = 0x9ddf_ea08_eb38_2d69;

/// Hash of the empty path, i.e. the archive root, without salt.
pub const ROOT_HASH: u64 = K2;

/// Salted archive hash: a non-zero salt is prepended as its decimal string.
pub fn hash(bytes: &[u8], salt: u16) -> u64 {
    if salt == 0 {
        return city_hash64(bytes);
    }
    let mut salted = salt.to_string().into_bytes();
    salted.extend_from_slice(bytes);
    city_hash64(&salted)
}

pub fn city_hash64(s: &[u8]) -> u64 {
    let len = s.len();
    if len <= 32 {
        if len <= 16 {
            return hash_len_0_to_16(s);
        }
        return hash_len_17_to_32(s);
    }
    if len <= 64 {
        return hash_len_33_to_64(s);
    }

    let mut x = fetch64(s, len - 40);
    let mut y = fetch64(s, len - 16).wrapping_add(fetch64(s, len - 56));
    let mut z = hash_len16(
        fetch64(s, len - 48).wrapping_add(len as u64),
        fetch64(s, len - 24),
    );
    let mut v = weak_hash_len32_with_seeds(s, len - 64, len as u64, z);
    let mut w = weak_hash_len32_with_seeds(s, len - 32, y.wrapping_add(K1), x);
    x = x.wrapping_mul(K1).wrapping_add(fetch64(s, 0));

    let mut pos = 0;
    let mut remaining = (len - 1) & !63;
    loop {
        x = rotate(
            x.wrapping_add(y)
                .wrapping_add(v.0)
                .wrapping_add(fetch64(s, pos + 8)),
            37,
        )
        .wrapping_mul(K1);
        y = rotate(y.wrapping_add(v.1).wrapping_add(fetch64(s, pos + 48)), 42).wrapping_mul(K1);
        x ^= w.1;
        y = y.wrapping_add(v.0).wrapping_add(fetch64(s, pos + 40));
        z = rotate(z.wrapping_add(w.0), 33).wrapping_mul(K1);
        v = weak_hash_len32_with_seeds(s, pos, v.1.wrapping_mul(K1), x.wrapping_add(w.0));
        w = weak_hash_len32_with_seeds(
            s,
            pos + 32,
            z.wrapping_add(w.1),
            y.wrapping_add(fetch64(s, pos + 16)),
        );
        std::mem::swap(&mut z, &mut x);
        pos += 64;
        remaining -= 64;
        if remaining == 0 {
            break;
        }
    }

    hash_len16(
        hash_len16(v.0, w.0)
            .wrapping_add(shift_mix(y).wrapping_mul(K1))
            .wrapping_add(z),
        hash_len16(v.1, w.1).wrapping_add(x),
    )
}

fn fetch64(s: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&s[at..at + 8]);
    u64::from_le_bytes(b)
}

fn fetch32(s: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&s[at..at + 4]);
    u32::from_le_bytes(b) as u64
}

fn rotate(val: u64, shift: u32) -> u64 {
    val.rotate_right(shift)
}

fn shift_mix(val: u64) -> u64 {
    val ^ (val >> 47)
}

fn hash_len16_mul(u: u64, v: u64, mul: u64) -> u64 {
    let mut a = (u ^ v).wrapping_mul(mul);
    a ^= a >> 47;
    let mut b = (v ^ a).wrapping_mul(mul);
    b ^= b >> 47;
    b.wrapping_mul(mul)
}

fn hash_len16(u: u64, v: u64) -> u64 {
    hash_len16_mul(u, v, K_MUL)
}

fn hash_len_0_to_16(s: &[u8]) -> u64 {
    let len = s.len();
    if len >= 8 {
        let mul = K2.wrapping_add(len as u64 * 2);
        let a = fetch64(s, 0).wrapping_add(K2);
        let b = fetch64(s, len - 8);
        let c = rotate(b, 37).wrapping_mul(mul).wrapping_add(a);
        let d = rotate(a, 25).wrapping_add(b).wrapping_mul(mul);
        return hash_len16_mul(c, d, mul);
    }
    if len >= 4 {
        let mul = K2.wrapping_add(len as u64 * 2);
        let a = fetch32(s, 0);
        return hash_len16_mul((len as u64).wrapping_add(a << 3), fetch32(s, len - 4), mul);
    }
    if len > 0 {
        let a = s[0] as u32;
        let b = s[len >> 1] as u32;
        let c = s[len - 1] as u32;
        let y = a.wrapping_add(b << 8);
        let z = (len as u32).wrapping_add(c << 2);
        return shift_mix((y as u64).wrapping_mul(K2) ^ (z as u64).wrapping_mul(K0))
            .wrapping_mul(K2);
    }
    K2
}

fn hash_len_17_to_32(s: &[u8]) -> u64 {
    let len = s.len();
    let mul = K2.wrapping_add(len as u64 * 2);
    let a = fetch64(s, 0).wrapping_mul(K1);
    let b = fetch64(s, 8);
    let c = fetch64(s, len - 8).wrapping_mul(mul);
    let d = fetch64(s, len - 16).wrapping_mul(K2);
    hash_len16_mul(
        rotate(a.wrapping_add(b), 43)
            .wrapping_add(rotate(c, 30))
            .wrapping_add(d),
        a.wrapping_add(rotate(b.wrapping_add(K2), 18)).wrapping_add(c),
        mul,
    )
}

fn hash_len_33_to_64(s: &[u8]) -> u64 {
    let len = s.len();
    let mul = K2.wrapping_add(len as u64 * 2);
    let mut a = fetch64(s, 0).wrapping_mul(K2);
    let mut b = fetch64(s, 8);
    let c = fetch64(s, len - 24);
    let d = fetch64(s, len - 32);
    let e = fetch64(s, 16).wrapping_mul(K2);
    let f = fetch64(s, 24).wrapping_mul(9);
    let g = fetch64(s, len - 8);
    let h = fetch64(s, len - 16).wrapping_mul(mul);
    let u = rotate(a.wrapping_add(g), 43)
        .wrapping_add(rotate(b, 30).wrapping_add(c).wrapping_mul(9));
    let v = (a.wrapping_add(g) ^ d).wrapping_add(f).wrapping_add(1);
    let w = u
        .wrapping_add(v)
        .wrapping_mul(mul)
        .swap_bytes()
        .wrapping_add(h);
    let x = rotate(e.wrapping_add(f), 42).wrapping_add(c);
    let y = v
        .wrapping_add(w)
        .wrapping_mul(mul)
        .swap_bytes()
        .wrapping_add(g)
        .wrapping_mul(mul);
    let z = e.wrapping_add(f).wrapping_add(c);
    a = x
        .wrapping_add(z)
        .wrapping_mul(mul)
        .wrapping_add(y)
        .swap_bytes()
        .wrapping_add(b);
    b = shift_mix(
        z.wrapping_add(a)
            .wrapping_mul(mul)
            .wrapping_add(d)
            .wrapping_add(h),
    )
    .wrapping_mul(mul);
    b.wrapping_add(x)
}

fn weak_hash_len32_with_seeds(s: &[u8], at: usize, a: u64, b: u64) -> (u64, u64) {
    let w = fetch64(s, at);
    let x = fetch64(s, at + 8);
    let y = fetch64(s, at + 16);
    let z = fetch64(s, at + 24);

    let mut a = a.wrapping_add(w);
    let mut b = rotate(b.wrapping_add(a).wrapping_add(z), 21);
    let c = a;
    a = a.wrapping_add(x).wrapping_add(y);
    b = b.wrapping_add(rotate(a, 44));
    (a.wrapping_add(z), b.wrapping_add(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn empty_input_is_root_hash() {
        assert_eq!(hash(b"", 0), 0x9ae1_6a3b_2f90_404f);
        assert_eq!(hash(b"", 0), ROOT_HASH);
    }

    #[test]
    fn salt_prepends_decimal_string() {
        assert_eq!(hash(b"def/world", 42), city_hash64(b"42def/world"));
        assert_eq!(hash(b"", 7), city_hash64(b"7"));
        assert_ne!(hash(b"def/world", 42), hash(b"def/world", 0));
    }

    #[test]
    fn stable_across_calls() {
        let s = b"vehicle/truck/upgrade/paintjob/default.sii";
        assert_eq!(hash(s, 0), hash(s, 0));
        assert_eq!(hash(s, 3), hash(s, 3));
    }

    #[test]
    fn every_length_bucket_spreads() {
        // Cover the 0..16, 17..32, 33..64 and long-loop code paths.
        let text: Vec<u8> = (0..300u32).map(|i| b'a' + (i % 26) as u8).collect();
        let mut seen = HashSet::new();
        for len in 0..text.len() {
            assert!(seen.insert(hash(&text[..len], 0)), "collision at len {len}");
        }
    }

    fn alphabet(len: usize) -> Vec<u8> {
        (0..len).map(|i| b'a' + (i % 26) as u8).collect()
    }

    #[test]
    fn matches_reference_vectors() {
        // CityHash64 v1.1 over "abcd...zabc..." prefixes, one or more per code path.
        let vectors: [(usize, u64); 19] = [
            (0, 0x9ae1_6a3b_2f90_404f),
            (1, 0xb345_4265_b6df_75e3),
            (3, 0x24a5_b3a0_74e7_f369),
            (4, 0x1a55_02de_4a1f_8101),
            (7, 0x3c40_c92b_1ccb_7355),
            (8, 0xfee9_d229_90c8_2909),
            (15, 0x687d_fc26_53bb_2c1d),
            (16, 0x5463_0bad_7705_cebd),
            (17, 0x9e21_06c7_2d77_93a8),
            (24, 0x9d2f_5fc7_19b0_0ef7),
            (32, 0xff96_b8a5_4087_359a),
            (33, 0x4139_52e5_a5f6_d473),
            (40, 0x524b_1ccc_e60b_b48c),
            (64, 0x07ca_e6bb_f09e_3c9b),
            (65, 0x66c4_1c19_5307_2b7a),
            (80, 0x7d17_07fc_a77d_0fbd),
            (128, 0xa5bc_a220_5cad_a145),
            (129, 0x5737_b479_7278_74a4),
            (200, 0x0145_b90b_9ab0_6ce7),
        ];
        for (len, want) in vectors {
            assert_eq!(city_hash64(&alphabet(len)), want, "len {len}");
        }
    }

    #[test]
    fn long_game_paths() {
        assert_eq!(hash(b"def", 0), 0x20c2_1a0b_c287_b313);
        assert_eq!(
            hash(b"vehicle/truck/upgrade/paintjob/default.sii", 0),
            0xebf5_b596_de3e_8ed2
        );
        assert_eq!(
            hash(b"vehicle/truck/scania.streamline/accessory/cabin/paintjob/metallic.sii", 0),
            0x6a5b_ae1e_91be_832b
        );
        // Salted and past the 64-byte block boundary.
        assert_eq!(
            hash(b"vehicle/truck/upgrade/paintjob/scania.streamline_metallic_default.sii", 12),
            0x504e_8824_2df8_a2d5
        );
    }

    #[test]
    fn single_byte_changes_flip_the_hash() {
        let a = b"material/ui/accessory/a.mat".to_vec();
        let mut b = a.clone();
        b[10] ^= 1;
        assert_ne!(city_hash64(&a), city_hash64(&b));
    }
}
