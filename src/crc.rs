pub mod crc8 {
    // CRC-8 with polynomial x^8 + x^2 + x + 1 (0x07).
    // init = 0x00, processed MSB-first, no reflection, no final xor.
    const POLY: u8 = 0x07;

    #[inline]
    fn update_byte(mut crc: u8, b: u8) -> u8 {
        crc ^= b;
        for _ in 0..8 {
            let mask = (crc >> 7).wrapping_neg() & POLY;
            crc = (crc << 1) ^ mask;
        }
        crc
    }

    #[inline]
    pub fn value(data: &[u8]) -> u8 {
        extend(0, data)
    }

    // Extend a prior CRC with more bytes (i.e., crc(data0 || data1)).
    #[inline]
    pub fn extend(initial_crc: u8, data: &[u8]) -> u8 {
        data.iter().fold(initial_crc, |crc, &b| update_byte(crc, b))
    }
}

#[cfg(test)]
mod tests {
    use super::crc8;

    #[test]
    fn check_value() {
        assert_eq!(crc8::value(b"123456789"), 0xF4);
        assert_eq!(crc8::value(b""), 0x00);
    }

    #[test]
    fn extend_matches_concatenation() {
        let whole = crc8::value(b"CFG1\x02\x01\x02");
        let parts = crc8::extend(crc8::extend(crc8::value(b"CFG1"), &[0x02]), &[0x01, 0x02]);
        assert_eq!(whole, parts);
    }

    #[test]
    fn detects_single_bit_flips() {
        let data = *b"MBT1 some payload";
        let good = crc8::value(&data);
        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data;
                flipped[byte] ^= 1 << bit;
                assert_ne!(crc8::value(&flipped), good, "byte {} bit {}", byte, bit);
            }
        }
    }
}
