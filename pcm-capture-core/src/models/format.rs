use std::fmt;

/// Sample encoding of an OS-offered mix format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    IeeeFloat,
    Pcm,
    /// Extensible container; the real encoding is the sub format.
    Extensible(SubFormat),
    /// Any other format tag.
    Other(u16),
}

/// Sub format of an extensible mix format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFormat {
    IeeeFloat,
    Pcm,
    Other,
}

/// The mix format a device offers, before negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixFormat {
    pub encoding: SampleEncoding,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl MixFormat {
    /// Whether samples are IEEE float, directly or through an extensible sub format.
    pub fn is_float(&self) -> bool {
        matches!(
            self.encoding,
            SampleEncoding::IeeeFloat | SampleEncoding::Extensible(SubFormat::IeeeFloat)
        )
    }
}

impl fmt::Display for MixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self.encoding {
            SampleEncoding::IeeeFloat => "float".to_string(),
            SampleEncoding::Pcm => "pcm".to_string(),
            SampleEncoding::Extensible(SubFormat::IeeeFloat) => "extensible/float".to_string(),
            SampleEncoding::Extensible(SubFormat::Pcm) => "extensible/pcm".to_string(),
            SampleEncoding::Extensible(SubFormat::Other) => "extensible/other".to_string(),
            SampleEncoding::Other(tag) => format!("tag 0x{:04x}", tag),
        };
        write!(
            f,
            "{} {}-bit, {} ch @ {} Hz",
            encoding, self.bits_per_sample, self.channels, self.sample_rate
        )
    }
}
