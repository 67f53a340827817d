//! Fixed byte-literal extraction-script templates, one per `FileType`.
//!
//! Grounded verbatim in the project's extraction-script byte tables: each
//! template is a Bourne-shell prelude terminated by `exit;`, a CRLF line
//! break, then a `#`-led Windows batch tail. Do not reformat or re-wrap
//! these literals -- the splice offsets in `scripts::splice_descriptor` are
//! computed against this exact byte content.

pub const VIDEO_AUDIO: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x4E,
    0x55, 0x4C, 0x3D, 0x22, 0x2F, 0x64, 0x65, 0x76, 0x2F, 0x6E, 0x75, 0x6C, 0x6C, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x68, 0x61, 0x73,
    0x68, 0x20, 0x2D, 0x72, 0x3B, 0x69, 0x66, 0x20, 0x63, 0x6F, 0x6D, 0x6D, 0x61, 0x6E, 0x64, 0x20,
    0x2D, 0x76, 0x20, 0x76, 0x6C, 0x63, 0x20, 0x3E, 0x24, 0x4E, 0x55, 0x4C, 0x20, 0x32, 0x3E, 0x26,
    0x31, 0x3B, 0x74, 0x68, 0x65, 0x6E, 0x20, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x76, 0x6C, 0x63,
    0x20, 0x2D, 0x2D, 0x70, 0x6C, 0x61, 0x79, 0x2D, 0x61, 0x6E, 0x64, 0x2D, 0x65, 0x78, 0x69, 0x74,
    0x20, 0x2D, 0x2D, 0x6E, 0x6F, 0x2D, 0x76, 0x69, 0x64, 0x65, 0x6F, 0x2D, 0x74, 0x69, 0x74, 0x6C,
    0x65, 0x2D, 0x73, 0x68, 0x6F, 0x77, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x26,
    0x3E, 0x20, 0x24, 0x4E, 0x55, 0x4C, 0x3B, 0x65, 0x6C, 0x69, 0x66, 0x20, 0x63, 0x6F, 0x6D, 0x6D,
    0x61, 0x6E, 0x64, 0x20, 0x2D, 0x76, 0x20, 0x6D, 0x70, 0x76, 0x20, 0x3E, 0x24, 0x4E, 0x55, 0x4C,
    0x20, 0x32, 0x3E, 0x26, 0x31, 0x3B, 0x74, 0x68, 0x65, 0x6E, 0x20, 0x63, 0x6C, 0x65, 0x61, 0x72,
    0x3B, 0x6D, 0x70, 0x76, 0x20, 0x2D, 0x2D, 0x71, 0x75, 0x69, 0x65, 0x74, 0x20, 0x22, 0x24, 0x49,
    0x54, 0x45, 0x4D, 0x22, 0x20, 0x26, 0x3E, 0x20, 0x24, 0x4E, 0x55, 0x4C, 0x3B, 0x65, 0x6C, 0x73,
    0x65, 0x20, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x66, 0x69, 0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B,
    0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C,
    0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64, 0x45, 0x78,
    0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44, 0x49, 0x52, 0x3D,
    0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64,
    0x26, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x6D,
    0x6F, 0x76, 0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C,
    0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21,
    0x26, 0x63, 0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22, 0x25, 0x7E,
    0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E,
    0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x22, 0x22, 0x26,
    0x65, 0x78, 0x69, 0x74,
];

pub const PDF: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x4E,
    0x55, 0x4C, 0x3D, 0x22, 0x2F, 0x64, 0x65, 0x76, 0x2F, 0x6E, 0x75, 0x6C, 0x6C, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x68, 0x61, 0x73,
    0x68, 0x20, 0x2D, 0x72, 0x3B, 0x69, 0x66, 0x20, 0x63, 0x6F, 0x6D, 0x6D, 0x61, 0x6E, 0x64, 0x20,
    0x2D, 0x76, 0x20, 0x65, 0x76, 0x69, 0x6E, 0x63, 0x65, 0x20, 0x3E, 0x24, 0x4E, 0x55, 0x4C, 0x20,
    0x32, 0x3E, 0x26, 0x31, 0x3B, 0x74, 0x68, 0x65, 0x6E, 0x20, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B,
    0x65, 0x76, 0x69, 0x6E, 0x63, 0x65, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x26,
    0x3E, 0x20, 0x24, 0x4E, 0x55, 0x4C, 0x3B, 0x65, 0x6C, 0x73, 0x65, 0x20, 0x66, 0x69, 0x72, 0x65,
    0x66, 0x6F, 0x78, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x26, 0x3E, 0x20, 0x24,
    0x4E, 0x55, 0x4C, 0x3B, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x66, 0x69, 0x3B, 0x65, 0x78, 0x69,
    0x74, 0x3B, 0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63,
    0x61, 0x6C, 0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64,
    0x45, 0x78, 0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44, 0x49,
    0x52, 0x3D, 0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74,
    0x65, 0x64, 0x26, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21,
    0x26, 0x6D, 0x6F, 0x76, 0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20,
    0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49,
    0x52, 0x21, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22,
    0x25, 0x7E, 0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25,
    0x7E, 0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x22,
    0x22, 0x26, 0x65, 0x78, 0x69, 0x74,
];

pub const PYTHON: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x68, 0x61, 0x73,
    0x68, 0x20, 0x2D, 0x72, 0x3B, 0x69, 0x66, 0x20, 0x63, 0x6F, 0x6D, 0x6D, 0x61, 0x6E, 0x64, 0x20,
    0x2D, 0x76, 0x20, 0x70, 0x79, 0x74, 0x68, 0x6F, 0x6E, 0x33, 0x20, 0x3E, 0x2F, 0x64, 0x65, 0x76,
    0x2F, 0x6E, 0x75, 0x6C, 0x6C, 0x20, 0x32, 0x3E, 0x26, 0x31, 0x3B, 0x74, 0x68, 0x65, 0x6E, 0x20,
    0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x70, 0x79, 0x74, 0x68, 0x6F, 0x6E, 0x33, 0x20, 0x22, 0x24,
    0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x3B, 0x65, 0x6C, 0x73, 0x65, 0x20, 0x63, 0x6C, 0x65, 0x61,
    0x72, 0x3B, 0x66, 0x69, 0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B, 0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C,
    0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C, 0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C,
    0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64, 0x45, 0x78, 0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F,
    0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x49, 0x54, 0x45, 0x4D, 0x3D, 0x26, 0x73, 0x65, 0x74, 0x20,
    0x41, 0x52, 0x47, 0x53, 0x3D, 0x26, 0x73, 0x65, 0x74, 0x20, 0x41, 0x50, 0x50, 0x3D, 0x70, 0x79,
    0x74, 0x68, 0x6F, 0x6E, 0x33, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44, 0x49, 0x52, 0x3D, 0x70, 0x64,
    0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x26, 0x6D,
    0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x6D, 0x6F, 0x76,
    0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C, 0x21, 0x44,
    0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63,
    0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30,
    0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30, 0x25,
    0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x77, 0x68, 0x65, 0x72, 0x65,
    0x20, 0x21, 0x41, 0x50, 0x50, 0x21, 0x20, 0x3E, 0x6E, 0x75, 0x6C, 0x20, 0x32, 0x3E, 0x26, 0x31,
    0x20, 0x26, 0x26, 0x20, 0x28, 0x21, 0x41, 0x50, 0x50, 0x21, 0x20, 0x22, 0x21, 0x49, 0x54, 0x45,
    0x4D, 0x21, 0x22, 0x20, 0x21, 0x41, 0x52, 0x47, 0x53, 0x21, 0x20, 0x29, 0x20, 0x7C, 0x7C, 0x20,
    0x28, 0x63, 0x6C, 0x73, 0x26, 0x65, 0x78, 0x69, 0x74, 0x29, 0x26, 0x65, 0x63, 0x68, 0x6F, 0x2E,
    0x26, 0x65, 0x78, 0x69, 0x74,
];

pub const POWERSHELL: &[u8] = &[
    0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72,
    0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x68, 0x61, 0x73,
    0x68, 0x20, 0x2D, 0x72, 0x3B, 0x69, 0x66, 0x20, 0x63, 0x6F, 0x6D, 0x6D, 0x61, 0x6E, 0x64, 0x20,
    0x2D, 0x76, 0x20, 0x70, 0x77, 0x73, 0x68, 0x20, 0x3E, 0x2F, 0x64, 0x65, 0x76, 0x2F, 0x6E, 0x75,
    0x6C, 0x6C, 0x20, 0x32, 0x3E, 0x26, 0x31, 0x3B, 0x74, 0x68, 0x65, 0x6E, 0x20, 0x63, 0x6C, 0x65,
    0x61, 0x72, 0x3B, 0x70, 0x77, 0x73, 0x68, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20,
    0x3B, 0x65, 0x6C, 0x73, 0x65, 0x20, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x66, 0x69, 0x3B, 0x65,
    0x78, 0x69, 0x74, 0x3B, 0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C,
    0x6F, 0x63, 0x61, 0x6C, 0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79,
    0x65, 0x64, 0x45, 0x78, 0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20,
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x26, 0x73, 0x65, 0x74, 0x20, 0x41, 0x52, 0x47, 0x53, 0x3D, 0x26,
    0x73, 0x65, 0x74, 0x20, 0x44, 0x49, 0x52, 0x3D, 0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65,
    0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x26, 0x73, 0x65, 0x74, 0x20, 0x50, 0x44, 0x49,
    0x52, 0x3D, 0x22, 0x25, 0x53, 0x79, 0x73, 0x74, 0x65, 0x6D, 0x44, 0x72, 0x69, 0x76, 0x65, 0x25,
    0x5C, 0x50, 0x72, 0x6F, 0x67, 0x72, 0x61, 0x6D, 0x20, 0x46, 0x69, 0x6C, 0x65, 0x73, 0x5C, 0x50,
    0x6F, 0x77, 0x65, 0x72, 0x53, 0x68, 0x65, 0x6C, 0x6C, 0x5C, 0x22, 0x26, 0x63, 0x6C, 0x73, 0x26,
    0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x6D, 0x6F,
    0x76, 0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C, 0x21,
    0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26,
    0x63, 0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22, 0x25, 0x7E, 0x6E,
    0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30,
    0x25, 0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x49, 0x46, 0x20, 0x45,
    0x58, 0x49, 0x53, 0x54, 0x20, 0x21, 0x50, 0x44, 0x49, 0x52, 0x21, 0x20, 0x28, 0x70, 0x77, 0x73,
    0x68, 0x20, 0x2D, 0x45, 0x78, 0x65, 0x63, 0x75, 0x74, 0x69, 0x6F, 0x6E, 0x50, 0x6F, 0x6C, 0x69,
    0x63, 0x79, 0x20, 0x42, 0x79, 0x70, 0x61, 0x73, 0x73, 0x20, 0x2D, 0x46, 0x69, 0x6C, 0x65, 0x20,
    0x22, 0x21, 0x49, 0x54, 0x45, 0x4D, 0x21, 0x22, 0x20, 0x21, 0x41, 0x52, 0x47, 0x53, 0x21, 0x26,
    0x65, 0x63, 0x68, 0x6F, 0x2E, 0x26, 0x65, 0x78, 0x69, 0x74, 0x29, 0x20, 0x45, 0x4C, 0x53, 0x45,
    0x20, 0x28, 0x70, 0x6F, 0x77, 0x65, 0x72, 0x73, 0x68, 0x65, 0x6C, 0x6C, 0x20, 0x2D, 0x45, 0x78,
    0x65, 0x63, 0x75, 0x74, 0x69, 0x6F, 0x6E, 0x50, 0x6F, 0x6C, 0x69, 0x63, 0x79, 0x20, 0x42, 0x79,
    0x70, 0x61, 0x73, 0x73, 0x20, 0x2D, 0x46, 0x69, 0x6C, 0x65, 0x20, 0x22, 0x21, 0x49, 0x54, 0x45,
    0x4D, 0x21, 0x22, 0x20, 0x21, 0x41, 0x52, 0x47, 0x53, 0x21, 0x26, 0x65, 0x63, 0x68, 0x6F, 0x2E,
    0x26, 0x65, 0x78, 0x69, 0x74, 0x29,
];

pub const BASH_SHELL: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x63, 0x68, 0x6D,
    0x6F, 0x64, 0x20, 0x2B, 0x78, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x3B, 0x2E, 0x2F,
    0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B, 0x0D, 0x0A,
    0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C, 0x20, 0x45,
    0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64, 0x45, 0x78, 0x70, 0x61,
    0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44, 0x49, 0x52, 0x3D, 0x70, 0x64,
    0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x26, 0x6D,
    0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x6D, 0x6F, 0x76,
    0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C, 0x21, 0x44,
    0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63,
    0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30,
    0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30, 0x25,
    0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x22, 0x22, 0x20, 0x26, 0x63,
    0x6C, 0x73, 0x26, 0x65, 0x78, 0x69, 0x74,
];

pub const WINDOWS_EXECUTABLE: &[u8] = &[
    0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72,
    0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64,
    0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20,
    0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22,
    0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E, 0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20,
    0x22, 0x24, 0x30, 0x22, 0x3B, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B,
    0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C,
    0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64, 0x45, 0x78,
    0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44, 0x49, 0x52, 0x3D,
    0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64,
    0x26, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x6D,
    0x6F, 0x76, 0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C,
    0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21,
    0x26, 0x63, 0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22, 0x25, 0x7E,
    0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E,
    0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x22, 0x22, 0x20,
    0x26, 0x65, 0x63, 0x68, 0x6F, 0x2E, 0x26, 0x65, 0x78, 0x69, 0x74,
];

pub const FOLDER: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x78, 0x64, 0x67,
    0x2D, 0x6F, 0x70, 0x65, 0x6E, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x26, 0x3E,
    0x20, 0x2F, 0x64, 0x65, 0x76, 0x2F, 0x6E, 0x75, 0x6C, 0x6C, 0x3B, 0x63, 0x6C, 0x65, 0x61, 0x72,
    0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B, 0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65,
    0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C, 0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C,
    0x61, 0x79, 0x65, 0x64, 0x45, 0x78, 0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65,
    0x74, 0x20, 0x44, 0x49, 0x52, 0x3D, 0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74,
    0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x26, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21,
    0x44, 0x49, 0x52, 0x21, 0x26, 0x6D, 0x6F, 0x76, 0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E,
    0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E,
    0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D,
    0x78, 0x66, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65,
    0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70,
    0x6E, 0x67, 0x26, 0x70, 0x6F, 0x77, 0x65, 0x72, 0x73, 0x68, 0x65, 0x6C, 0x6C, 0x20, 0x22, 0x49,
    0x49, 0x20, 0x27, 0x27, 0x22, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x65, 0x78, 0x69, 0x74,
];

pub const LINUX_EXECUTABLE: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x63, 0x68, 0x6D,
    0x6F, 0x64, 0x20, 0x2B, 0x78, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x3B, 0x2E, 0x2F,
    0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x20, 0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B, 0x0D, 0x0A,
    0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C, 0x20, 0x45,
    0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64, 0x45, 0x78, 0x70, 0x61,
    0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44, 0x49, 0x52, 0x3D, 0x70, 0x64,
    0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x26, 0x6D,
    0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x6D, 0x6F, 0x76,
    0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2E, 0x5C, 0x21, 0x44,
    0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63,
    0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30,
    0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x6E, 0x30, 0x25,
    0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x65,
    0x78, 0x69, 0x74,
];

pub const JAR: &[u8] = &[
    0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x68, 0x61, 0x73, 0x68, 0x20, 0x2D, 0x72, 0x3B, 0x69, 0x66,
    0x20, 0x63, 0x6F, 0x6D, 0x6D, 0x61, 0x6E, 0x64, 0x20, 0x2D, 0x76, 0x20, 0x6A, 0x61, 0x76, 0x61,
    0x20, 0x3E, 0x2F, 0x64, 0x65, 0x76, 0x2F, 0x6E, 0x75, 0x6C, 0x6C, 0x20, 0x32, 0x3E, 0x26, 0x31,
    0x3B, 0x74, 0x68, 0x65, 0x6E, 0x20, 0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6A, 0x61, 0x76, 0x61,
    0x20, 0x2D, 0x6A, 0x61, 0x72, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x65, 0x6C, 0x73, 0x65, 0x20,
    0x63, 0x6C, 0x65, 0x61, 0x72, 0x3B, 0x66, 0x69, 0x3B, 0x65, 0x78, 0x69, 0x74, 0x3B, 0x0D, 0x0A,
    0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F, 0x63, 0x61, 0x6C, 0x20, 0x45,
    0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65, 0x64, 0x45, 0x78, 0x70, 0x61,
    0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x41, 0x50, 0x50, 0x3D, 0x6A, 0x61,
    0x76, 0x61, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x77, 0x68, 0x65, 0x72, 0x65, 0x20, 0x21, 0x41, 0x50,
    0x50, 0x21, 0x20, 0x3E, 0x6E, 0x75, 0x6C, 0x20, 0x32, 0x3E, 0x26, 0x31, 0x20, 0x26, 0x26, 0x20,
    0x28, 0x21, 0x41, 0x50, 0x50, 0x21, 0x20, 0x2D, 0x6A, 0x61, 0x72, 0x20, 0x22, 0x25, 0x7E, 0x64,
    0x70, 0x6E, 0x78, 0x30, 0x22, 0x29, 0x20, 0x7C, 0x7C, 0x20, 0x28, 0x63, 0x6C, 0x73, 0x29, 0x26,
    0x72, 0x65, 0x6E, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E,
    0x70, 0x6E, 0x67, 0x26, 0x65, 0x63, 0x68, 0x6F, 0x2E, 0x26, 0x65, 0x78, 0x69, 0x74,
];

pub const UNKNOWN_FILE_TYPE: &[u8] = &[
    0x49, 0x54, 0x45, 0x4D, 0x3D, 0x22, 0x22, 0x3B, 0x44, 0x49, 0x52, 0x3D, 0x22, 0x70, 0x64, 0x76,
    0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63, 0x74, 0x65, 0x64, 0x22, 0x3B, 0x63,
    0x6C, 0x65, 0x61, 0x72, 0x3B, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2D, 0x70, 0x20, 0x22, 0x24,
    0x44, 0x49, 0x52, 0x22, 0x3B, 0x6D, 0x76, 0x20, 0x22, 0x24, 0x30, 0x22, 0x20, 0x22, 0x24, 0x44,
    0x49, 0x52, 0x22, 0x3B, 0x63, 0x64, 0x20, 0x22, 0x24, 0x44, 0x49, 0x52, 0x22, 0x3B, 0x75, 0x6E,
    0x7A, 0x69, 0x70, 0x20, 0x2D, 0x71, 0x6F, 0x20, 0x22, 0x24, 0x30, 0x22, 0x3B, 0x78, 0x64, 0x67,
    0x2D, 0x6F, 0x70, 0x65, 0x6E, 0x20, 0x22, 0x24, 0x49, 0x54, 0x45, 0x4D, 0x22, 0x3B, 0x65, 0x78,
    0x69, 0x74, 0x3B, 0x0D, 0x0A, 0x23, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x73, 0x65, 0x74, 0x6C, 0x6F,
    0x63, 0x61, 0x6C, 0x20, 0x45, 0x6E, 0x61, 0x62, 0x6C, 0x65, 0x44, 0x65, 0x6C, 0x61, 0x79, 0x65,
    0x64, 0x45, 0x78, 0x70, 0x61, 0x6E, 0x73, 0x69, 0x6F, 0x6E, 0x26, 0x73, 0x65, 0x74, 0x20, 0x44,
    0x49, 0x52, 0x3D, 0x70, 0x64, 0x76, 0x7A, 0x69, 0x70, 0x5F, 0x65, 0x78, 0x74, 0x72, 0x61, 0x63,
    0x74, 0x65, 0x64, 0x26, 0x6D, 0x6B, 0x64, 0x69, 0x72, 0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52,
    0x21, 0x26, 0x6D, 0x6F, 0x76, 0x65, 0x20, 0x22, 0x25, 0x7E, 0x64, 0x70, 0x6E, 0x78, 0x30, 0x22,
    0x20, 0x2E, 0x5C, 0x21, 0x44, 0x49, 0x52, 0x21, 0x26, 0x63, 0x64, 0x20, 0x2E, 0x5C, 0x21, 0x44,
    0x49, 0x52, 0x21, 0x26, 0x63, 0x6C, 0x73, 0x26, 0x74, 0x61, 0x72, 0x20, 0x2D, 0x78, 0x66, 0x20,
    0x22, 0x25, 0x7E, 0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x26, 0x72, 0x65, 0x6E, 0x20, 0x22,
    0x25, 0x7E, 0x6E, 0x30, 0x25, 0x7E, 0x78, 0x30, 0x22, 0x20, 0x2A, 0x2E, 0x70, 0x6E, 0x67, 0x26,
    0x22, 0x22, 0x26, 0x65, 0x63, 0x68, 0x6F, 0x2E, 0x26, 0x65, 0x78, 0x69, 0x74,
];

