//! Hex transport for compressed arkworks values (curve points in proof
//! envelopes and ceremony transcripts).

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};

pub fn to_compressed_hex<T: CanonicalSerialize>(value: &T) -> String {
    let mut bytes = Vec::with_capacity(value.serialized_size(Compress::Yes));
    // Writing into a Vec cannot fail.
    let _ = value.serialize_with_mode(&mut bytes, Compress::Yes);
    hex::encode(bytes)
}

/// Decode and fully validate (on-curve, prime-order subgroup).
pub fn from_compressed_hex<T: CanonicalDeserialize>(s: &str) -> Result<T, String> {
    let bytes = hex::decode(s).map_err(|e| format!("invalid hex: {e}"))?;
    let mut reader = bytes.as_slice();
    let value = T::deserialize_with_mode(&mut reader, Compress::Yes, Validate::Yes)
        .map_err(|e| format!("invalid encoding: {e}"))?;
    if !reader.is_empty() {
        return Err(format!("{} trailing bytes", reader.len()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{G1Affine, G2Affine};
    use ark_ec::AffineRepr;

    #[test]
    fn points_survive_hex() {
        let g1 = G1Affine::generator();
        let hex = to_compressed_hex(&g1);
        assert_eq!(hex.len(), 64);
        assert_eq!(from_compressed_hex::<G1Affine>(&hex).unwrap(), g1);

        let g2 = G2Affine::generator();
        assert_eq!(from_compressed_hex::<G2Affine>(&to_compressed_hex(&g2)).unwrap(), g2);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(from_compressed_hex::<G1Affine>("zz").is_err());
        assert!(from_compressed_hex::<G1Affine>(&"ff".repeat(32)).is_err());
        let mut hex = to_compressed_hex(&G1Affine::generator());
        hex.push_str("00");
        assert!(from_compressed_hex::<G1Affine>(&hex).unwrap_err().contains("trailing"));
    }
}
