//! Fixed lookup tables shared by the codec builders.

/// Zig-zag scan order: `ZIGZAG_DIRECT[i]` is the raster position of the i-th
/// coefficient in bitstream scan order.
pub const ZIGZAG_DIRECT: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Permutes a zig-zag-ordered 64-entry matrix into raster order.
pub fn zigzag_to_raster(zigzag: &[u8; 64]) -> [u8; 64] {
    let mut raster = [0u8; 64];
    for (i, &value) in zigzag.iter().enumerate() {
        raster[ZIGZAG_DIRECT[i]] = value;
    }
    raster
}

/// VP8 DC quantizer lookup, indexed by the clipped quantization index.
pub const VP8_DC_QLOOKUP: [u32; 128] = [
    4, 5, 6, 7, 8, 9, 10, 10, 11, 12, 13, 14, 15, 16, 17, 17, //
    18, 19, 20, 20, 21, 21, 22, 22, 23, 23, 24, 25, 25, 26, 27, 28, //
    29, 30, 31, 32, 33, 34, 35, 36, 37, 37, 38, 39, 40, 41, 42, 43, //
    44, 45, 46, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, //
    59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 69, 70, 71, 72, 73, 74, //
    75, 76, 76, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, //
    91, 93, 95, 96, 98, 100, 101, 102, 104, 106, 108, 110, 112, 114, 116, 118, //
    122, 124, 126, 128, 130, 132, 134, 136, 138, 140, 143, 145, 148, 151, 154, 157,
];

/// VP8 AC quantizer lookup, indexed by the clipped quantization index.
pub const VP8_AC_QLOOKUP: [u32; 128] = [
    4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, //
    20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, //
    36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51, //
    52, 53, 54, 55, 56, 57, 58, 60, 62, 64, 66, 68, 70, 72, 74, 76, //
    78, 80, 82, 84, 86, 88, 90, 92, 94, 96, 98, 100, 102, 104, 106, 108, //
    110, 112, 114, 116, 119, 122, 125, 128, 131, 134, 137, 140, 143, 146, 149, 152, //
    155, 158, 161, 164, 167, 170, 173, 177, 181, 185, 189, 193, 197, 201, 205, 209, //
    213, 217, 221, 225, 229, 234, 239, 245, 249, 254, 259, 264, 269, 274, 279, 284,
];

/// Clamps a VP8 quantization index into the lookup range.
pub fn vp8_clip_quantization_index(index: i32) -> usize {
    index.clamp(0, 127) as usize
}

/// VC-1 B-picture scale factors, indexed by the coded B fraction.
pub const B_PICTURE_SCALE_FACTOR: [u32; 21] = [
    128, 85, 170, 64, 192, //
    51, 102, 153, 204, 43, //
    215, 37, 74, 111, 148, //
    185, 222, 32, 96, 160, //
    224,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_is_a_bijection() {
        // Feeding the identity sequence through the permutation and reading
        // back through the scan table must reproduce the original.
        let mut identity = [0u8; 64];
        for (i, v) in identity.iter_mut().enumerate() {
            *v = i as u8;
        }
        let raster = zigzag_to_raster(&identity);
        for i in 0..64 {
            assert_eq!(raster[ZIGZAG_DIRECT[i]], i as u8);
        }
        let mut seen = [false; 64];
        for &pos in ZIGZAG_DIRECT.iter() {
            assert!(!seen[pos]);
            seen[pos] = true;
        }
    }

    #[test]
    fn quantization_index_clips_to_table_range() {
        assert_eq!(vp8_clip_quantization_index(-5), 0);
        assert_eq!(vp8_clip_quantization_index(0), 0);
        assert_eq!(vp8_clip_quantization_index(127), 127);
        assert_eq!(vp8_clip_quantization_index(300), 127);
    }
}
