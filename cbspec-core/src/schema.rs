//! Record-layout variants and their logical field maps.
//!
//! Result files come in two layouts. `resTree` files carry per-fit branches as
//! list-valued columns and a list-valued `energy`; `tTlfit` files carry a
//! scalar `energy_s800_p` and mostly scalar fit outputs. [`resolve_schema`]
//! picks the layout once per batch from the column names, and [`FieldMap`]
//! tells the reader which column and element backs each logical field.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Marker column for the `resTree` layout.
pub const RES_TREE_MARKER: &str = "energy";
/// Marker column for the `tTlfit` layout.
pub const TL_FIT_MARKER: &str = "energy_s800_p";

/// Record-layout variant of an input batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SchemaVariant {
    #[serde(rename = "resTree")]
    ResTree,
    #[serde(rename = "tTlfit")]
    TlFit,
}

impl SchemaVariant {
    /// Index of the reconstruction branch used for angular and fit fields.
    #[must_use]
    pub fn branch_index(self) -> usize {
        match self {
            SchemaVariant::ResTree => 2,
            SchemaVariant::TlFit => 1,
        }
    }

    /// Tree name as written in run logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVariant::ResTree => "resTree",
            SchemaVariant::TlFit => "tTlfit",
        }
    }

    /// Column-to-field mapping for this variant.
    #[must_use]
    pub fn field_map(self) -> FieldMap {
        FieldMap::for_variant(self)
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the layout of a batch from its column names.
///
/// `energy` takes precedence, so a batch carrying both markers is a `resTree`.
///
/// # Errors
/// Returns [`Error::UnknownSchema`] when neither marker column is present.
pub fn resolve_schema<S: AsRef<str>>(columns: &[S]) -> Result<SchemaVariant> {
    let has = |name: &str| columns.iter().any(|c| c.as_ref() == name);
    if has(RES_TREE_MARKER) {
        Ok(SchemaVariant::ResTree)
    } else if has(TL_FIT_MARKER) {
        Ok(SchemaVariant::TlFit)
    } else {
        Err(Error::UnknownSchema {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        })
    }
}

/// How a logical value is read from its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    /// One numeric value per row.
    Scalar,
    /// Element `n` of a list-valued column.
    Branch(usize),
}

/// A physical column backing one logical field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRef {
    pub name: &'static str,
    pub element: Element,
    /// Multiplier applied after extraction (unit conversion).
    pub scale: f64,
}

impl ColumnRef {
    const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            element: Element::Scalar,
            scale: 1.0,
        }
    }

    const fn branch(name: &'static str, index: usize) -> Self {
        Self {
            name,
            element: Element::Branch(index),
            scale: 1.0,
        }
    }

    const fn scaled(self, scale: f64) -> Self {
        Self { scale, ..self }
    }
}

/// Logical field set of an event record, mapped onto one layout's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    pub variant: SchemaVariant,
    pub energy: ColumnRef,
    pub mc_energy: ColumnRef,
    pub sc: ColumnRef,
    pub dsc: ColumnRef,
    pub good_sd_count: ColumnRef,
    pub border_dist: ColumnRef,
    pub ldf_chi2: ColumnRef,
    pub geom_chi2: ColumnRef,
    pub ped_err: ColumnRef,
    pub zenith: ColumnRef,
}

impl FieldMap {
    /// Build the mapping for a layout.
    #[must_use]
    pub fn for_variant(variant: SchemaVariant) -> Self {
        let s = variant.branch_index();
        match variant {
            SchemaVariant::ResTree => Self {
                variant,
                energy: ColumnRef::branch("energy", 0),
                mc_energy: ColumnRef::scalar("mcenergy"),
                sc: ColumnRef::branch("sc", 0),
                dsc: ColumnRef::branch("dsc", 0),
                good_sd_count: ColumnRef::scalar("nstclust"),
                // resTree stores border distance in km
                border_dist: ColumnRef::scalar("bdist").scaled(1000.0),
                ldf_chi2: ColumnRef::branch("ldfchi2", 0),
                geom_chi2: ColumnRef::branch("gfchi2", s),
                ped_err: ColumnRef::branch("pderr", s),
                zenith: ColumnRef::branch("theta", s),
            },
            SchemaVariant::TlFit => Self {
                variant,
                energy: ColumnRef::scalar(TL_FIT_MARKER),
                mc_energy: ColumnRef::scalar("mcenergy"),
                sc: ColumnRef::scalar("sc"),
                dsc: ColumnRef::scalar("dsc"),
                good_sd_count: ColumnRef::scalar("ngsd"),
                border_dist: ColumnRef::scalar("bdist"),
                ldf_chi2: ColumnRef::scalar("ldfchi2pdof"),
                geom_chi2: ColumnRef::branch("gfchi2pdof", s),
                ped_err: ColumnRef::branch("pderr", s),
                zenith: ColumnRef::branch("theta", s),
            },
        }
    }

    /// Columns that must be present for every batch of this layout.
    #[must_use]
    pub fn required(&self) -> [&ColumnRef; 9] {
        [
            &self.energy,
            &self.sc,
            &self.dsc,
            &self.good_sd_count,
            &self.border_dist,
            &self.ldf_chi2,
            &self.geom_chi2,
            &self.ped_err,
            &self.zenith,
        ]
    }
}
