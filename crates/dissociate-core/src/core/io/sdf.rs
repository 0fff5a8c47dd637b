use super::traits::MolecularFileWriter;
use crate::core::models::molecule::Molecule;
use std::io::{self, Write};
use thiserror::Error;

const PROGRAM_LINE: &str = "  dissociate";

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// MDL SD file (V2000 connection tables) used as the dataset structure file.
///
/// Each record carries the molecule label and its sequential position in the title
/// line, `"{formula}_{charge}_{id}_{energy} int_id: {i}"`. Bonds are written in
/// [`Molecule::sdf_bond_indices`] order and the molecular charge is placed on the first
/// atom in an `M  CHG` property line.
pub struct SdfFile;

impl SdfFile {
    pub fn write_record(
        molecule: &Molecule,
        int_id: usize,
        writer: &mut impl Write,
    ) -> Result<(), SdfError> {
        writeln!(writer, "{} int_id: {}", molecule.label(), int_id)?;
        writeln!(writer, "{}", PROGRAM_LINE)?;
        writeln!(writer)?;
        writeln!(
            writer,
            "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
            molecule.num_atoms(),
            molecule.bonds().len()
        )?;
        for (specie, p) in molecule.species().iter().zip(molecule.coords()) {
            writeln!(
                writer,
                "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
                p.x, p.y, p.z, specie
            )?;
        }
        for bond in molecule.sdf_bonds() {
            let (a, b) = bond.atoms;
            writeln!(
                writer,
                "{:>3}{:>3}{:>3}  0  0  0  0",
                a + 1,
                b + 1,
                bond.order.sdf_code()
            )?;
        }
        if molecule.charge() != 0 {
            writeln!(writer, "M  CHG  1{:>4}{:>4}", 1, molecule.charge())?;
        }
        writeln!(writer, "M  END")?;
        writeln!(writer, "$$$$")?;
        Ok(())
    }
}

impl MolecularFileWriter for SdfFile {
    type Error = SdfError;

    fn write_to<'a>(
        molecules: impl IntoIterator<Item = &'a Molecule>,
        writer: &mut impl Write,
    ) -> Result<(), SdfError> {
        for (i, molecule) in molecules.into_iter().enumerate() {
            Self::write_record(molecule, i, writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::tests::{dimethyl_peroxide, molecule};

    fn write_all(molecules: &[Molecule]) -> String {
        let mut buf = Vec::new();
        SdfFile::write_to(molecules, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn record_layout_follows_v2000() {
        let water = molecule("w", &["O", "H", "H"], &[(2, 0), (0, 1)], -1, Some(-1.25));
        let text = write_all(std::slice::from_ref(&water));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "H2O_-1_w_-1.25 int_id: 0");
        assert_eq!(lines[1], PROGRAM_LINE);
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("  3  2"));
        assert!(lines[3].ends_with("V2000"));
        assert_eq!(&lines[4][31..34], "O  ");
        // Bond block sorted by lower atom index, keeping declared orientation.
        assert_eq!(lines[7], "  1  2  1  0  0  0  0");
        assert_eq!(lines[8], "  3  1  1  0  0  0  0");
        assert_eq!(lines[9], "M  CHG  1   1  -1");
        assert_eq!(lines[10], "M  END");
        assert_eq!(lines[11], "$$$$");
        assert_eq!(lines.len(), 12);
    }

    #[test]
    fn neutral_molecule_has_no_charge_line_and_int_ids_increase() {
        let a = dimethyl_peroxide("a", 0, None);
        let b = dimethyl_peroxide("b", 0, None);
        let text = write_all(&[a, b]);
        assert!(!text.contains("M  CHG"));
        assert!(text.contains("C2H6O2_0_a_None int_id: 0"));
        assert!(text.contains("C2H6O2_0_b_None int_id: 1"));
        assert_eq!(text.matches("$$$$").count(), 2);
    }

    #[test]
    fn write_to_path_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("struct.sdf");
        let water = molecule("w", &["O", "H", "H"], &[(0, 1), (0, 2)], 0, None);
        SdfFile::write_to_path([&water], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("H2O_0_w_None int_id: 0\n"));
    }
}
