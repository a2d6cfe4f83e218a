//! JPEG baseline picture, table and scan parameters.

#[derive(Clone, Copy, Debug, Default)]
pub struct JpegComponent {
    pub component_id: u8,
    pub h_sampling_factor: u8,
    pub v_sampling_factor: u8,
    pub quantiser_table_selector: u8,
}

#[derive(Clone, Debug, Default)]
pub struct JpegPictureParams {
    pub picture_width: u16,
    pub picture_height: u16,
    pub components: [JpegComponent; 4],
    pub num_components: u8,
}

/// Quantization tables in zig-zag order with per-table load flags.
#[derive(Clone, Debug)]
pub struct JpegIqMatrix {
    pub load_quantiser_table: [bool; 4],
    pub quantiser_table: [[u8; 64]; 4],
}

impl Default for JpegIqMatrix {
    fn default() -> Self {
        Self {
            load_quantiser_table: [false; 4],
            quantiser_table: [[0; 64]; 4],
        }
    }
}

#[derive(Clone, Debug)]
pub struct JpegHuffmanTable {
    pub num_dc_codes: [u8; 16],
    pub dc_values: [u8; 12],
    pub num_ac_codes: [u8; 16],
    pub ac_values: [u8; 162],
    pub pad: [u8; 2],
}

impl Default for JpegHuffmanTable {
    fn default() -> Self {
        Self {
            num_dc_codes: [0; 16],
            dc_values: [0; 12],
            num_ac_codes: [0; 16],
            ac_values: [0; 162],
            pad: [0; 2],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct JpegHuffmanTableParams {
    pub load_huffman_table: [bool; 2],
    pub huffman_table: [JpegHuffmanTable; 2],
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JpegScanComponent {
    pub component_selector: u8,
    pub dc_table_selector: u8,
    pub ac_table_selector: u8,
}

#[derive(Clone, Debug, Default)]
pub struct JpegSliceParams {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    pub slice_horizontal_position: u32,
    pub slice_vertical_position: u32,
    pub components: [JpegScanComponent; 4],
    pub num_components: u8,
    pub restart_interval: u16,
    pub num_mcus: u32,
}
