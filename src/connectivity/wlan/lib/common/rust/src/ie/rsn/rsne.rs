// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::SuiteSelector,
    byteorder::{LittleEndian, ReadBytesExt},
    std::io::{self, Cursor, Read},
    thiserror::Error,
};

macro_rules! return_ok_on_empty {
    ($rdr:expr, $result:expr) => {
        if remaining(&$rdr) == 0 {
            return Ok($result);
        }
    };
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected io error while parsing RSNE: {0}")]
    UnexpectedIoError(#[from] io::Error),
    #[error("invalid RSNE; too short")]
    TooShort,
    #[error("invalid RSNE; too long")]
    TooLong,
    #[error("invalid RSNE; unsupported version {0}")]
    UnsupportedVersion(u16),
    #[error("invalid RSNE; expected suite selector but was too short")]
    ExpectedSuiteSelector,
    #[error("invalid RSNE; expected pairwise cipher suite list count but failed with: {0}")]
    ExpectedPairwiseListCount(io::Error),
    #[error("invalid RSNE; expected AKM suite list count but failed with: {0}")]
    ExpectedAkmListCount(io::Error),
    #[error("invalid RSNE; expected RSN capabilities but failed with: {0}")]
    ExpectedCapabilities(io::Error),
    #[error("invalid RSNE; expected PMKID list count but failed with: {0}")]
    ExpectedPmkidListCount(io::Error),
    #[error("invalid RSNE; expected PMKID but was too short")]
    ExpectedPmkid,
    #[error("invalid RSNE; {0} trailing bytes")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

// IEEE Std 802.11-2016, 9.4.2.25.1, Figure 9-255
pub const MAX_BODY_LEN: usize = 255;

pub type Pmkid = [u8; 16];

// IEEE Std 802.11-2016, 9.4.2.25.1
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Rsne {
    pub version: u16,
    pub group_data_cipher_suite: Option<SuiteSelector>,
    pub pairwise_cipher_suites: Vec<SuiteSelector>,
    pub akm_suites: Vec<SuiteSelector>,
    pub rsn_capabilities: Option<u16>,
    pub pmkids: Vec<Pmkid>,
    pub group_mgmt_cipher_suite: Option<SuiteSelector>,
}

impl Rsne {
    /// Management frame protection capable, bit 7 of the RSN capabilities.
    pub fn mfp_capable(&self) -> bool {
        self.rsn_capabilities.map_or(false, |caps| caps & (1 << 7) != 0)
    }

    /// Management frame protection required, bit 6 of the RSN capabilities.
    pub fn mfp_required(&self) -> bool {
        self.rsn_capabilities.map_or(false, |caps| caps & (1 << 6) != 0)
    }
}

fn remaining(rdr: &Cursor<&[u8]>) -> usize {
    rdr.get_ref().len().saturating_sub(rdr.position() as usize)
}

/// Parses and validates the body of an RSN element. Every optional field must be complete and
/// nothing may follow the last field.
pub fn from_bytes(body: &[u8]) -> Result<Rsne> {
    if body.len() > MAX_BODY_LEN {
        return Err(Error::TooLong);
    }
    if body.len() < 2 {
        return Err(Error::TooShort);
    }

    let mut rdr = Cursor::new(body);
    let mut rsne = Rsne { version: rdr.read_u16::<LittleEndian>()?, ..Default::default() };
    if rsne.version != 1 {
        return Err(Error::UnsupportedVersion(rsne.version));
    }

    return_ok_on_empty!(rdr, rsne);
    rsne.group_data_cipher_suite = Some(read_suite_selector(&mut rdr)?);

    return_ok_on_empty!(rdr, rsne);
    let count = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedPairwiseListCount)?;
    for _ in 0..count {
        rsne.pairwise_cipher_suites.push(read_suite_selector(&mut rdr)?);
    }

    return_ok_on_empty!(rdr, rsne);
    let count = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedAkmListCount)?;
    for _ in 0..count {
        rsne.akm_suites.push(read_suite_selector(&mut rdr)?);
    }

    return_ok_on_empty!(rdr, rsne);
    rsne.rsn_capabilities =
        Some(rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedCapabilities)?);

    return_ok_on_empty!(rdr, rsne);
    let count = rdr.read_u16::<LittleEndian>().map_err(Error::ExpectedPmkidListCount)?;
    for _ in 0..count {
        rsne.pmkids.push(read_pmkid(&mut rdr)?);
    }

    return_ok_on_empty!(rdr, rsne);
    rsne.group_mgmt_cipher_suite = Some(read_suite_selector(&mut rdr)?);

    match remaining(&rdr) {
        0 => Ok(rsne),
        trailing => Err(Error::TrailingBytes(trailing)),
    }
}

fn read_suite_selector(rdr: &mut Cursor<&[u8]>) -> Result<SuiteSelector> {
    if remaining(rdr) < 4 {
        return Err(Error::ExpectedSuiteSelector);
    }
    let mut oui = [0; 3];
    rdr.read_exact(&mut oui)?;
    let suite_type = rdr.read_u8()?;
    Ok(SuiteSelector { oui, suite_type })
}

fn read_pmkid(rdr: &mut Cursor<&[u8]>) -> Result<Pmkid> {
    if remaining(rdr) < 16 {
        return Err(Error::ExpectedPmkid);
    }
    let mut pmkid = [0; 16];
    rdr.read_exact(&mut pmkid)?;
    Ok(pmkid)
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[rustfmt::skip]
    const WPA2_PSK_CCMP: [u8; 20] = [
        0x01, 0x00, // version
        0x00, 0x0f, 0xac, 0x04, // group data cipher: CCMP-128
        0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, // one pairwise cipher: CCMP-128
        0x01, 0x00, 0x00, 0x0f, 0xac, 0x02, // one AKM: PSK
        0x80, 0x00, // capabilities: MFP capable
    ];

    #[test]
    fn parses_wpa2_rsne() {
        let rsne = from_bytes(&WPA2_PSK_CCMP[..]).expect("valid RSNE");
        assert_eq!(rsne.version, 1);
        assert_eq!(rsne.pairwise_cipher_suites.len(), 1);
        assert_eq!(rsne.akm_suites[0], SuiteSelector { oui: [0x00, 0x0f, 0xac], suite_type: 2 });
        assert!(rsne.mfp_capable());
        assert!(!rsne.mfp_required());
    }

    #[test]
    fn version_only_is_valid() {
        let rsne = from_bytes(&[0x01, 0x00][..]).expect("valid RSNE");
        assert_eq!(rsne.group_data_cipher_suite, None);
    }

    #[test]
    fn rejects_malformed_rsne() {
        assert_matches!(from_bytes(&[0x01][..]), Err(Error::TooShort));
        assert_matches!(from_bytes(&[0x02, 0x00][..]), Err(Error::UnsupportedVersion(2)));
        // Pairwise count claims two suites but only one follows.
        let mut truncated = WPA2_PSK_CCMP[..12].to_vec();
        truncated[6] = 0x02;
        assert_matches!(from_bytes(&truncated[..]), Err(Error::ExpectedSuiteSelector));
        // Single byte where the AKM count should be.
        assert_matches!(from_bytes(&WPA2_PSK_CCMP[..13]), Err(Error::ExpectedAkmListCount(_)));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut rsne = WPA2_PSK_CCMP.to_vec();
        rsne.extend_from_slice(&[0, 0, 0x00, 0x0f, 0xac, 0x06, 0xff]);
        assert_matches!(from_bytes(&rsne[..]), Err(Error::TrailingBytes(1)));
    }
}
