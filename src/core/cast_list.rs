//! Cruise, leg and cast lists from a mapping row, lined up one entry per cast.

use crate::domain::model::CastRef;
use crate::utils::error::{CtdError, Result};

/// `"AT26-30, AT26-31"` -> `["AT26-30", "AT26-31"]`; a value without commas is a single entry.
pub fn split_field(value: &str) -> Vec<String> {
    if value.contains(',') {
        value
            .split(',')
            .map(|part| part.chars().filter(|c| !c.is_whitespace()).collect())
            .collect()
    } else {
        vec![value.to_string()]
    }
}

/// Lines up the cruise, leg and cast fields of a mapping row.
///
/// Equal lengths zip directly. Otherwise a single cruise (and leg) is repeated for every
/// cast, and a single empty leg stands for "no leg" on every cast.
pub fn align_casts(cruise: &str, leg: &str, cast: &str) -> Result<Vec<CastRef>> {
    let cruises = split_field(cruise);
    let legs = split_field(leg);
    let casts = split_field(cast);
    let (nc, nl, nk) = (cruises.len(), legs.len(), casts.len());

    let (cruises, legs) = if nc == nl && nl == nk {
        (cruises, legs)
    } else if nc != nl && nl == nk && nc == 1 {
        (vec![cruises[0].clone(); nk], legs)
    } else if nc == nl && nl != nk && nc == 1 {
        (vec![cruises[0].clone(); nk], vec![legs[0].clone(); nk])
    } else if legs == [""] && nc == nk {
        (cruises, vec![String::new(); nk])
    } else {
        return Err(CtdError::MappingError {
            message: format!(
                "CTD_CruiseName ({}), CTD_CruiseLeg ({}) and CTDcast ({}) lengths don't match up",
                nc, nl, nk
            ),
        });
    };

    Ok(cruises
        .into_iter()
        .zip(legs)
        .zip(casts)
        .map(|((cruise, leg), cast)| CastRef { cruise, leg, cast })
        .collect())
}
