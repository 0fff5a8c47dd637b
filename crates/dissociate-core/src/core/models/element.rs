use phf::{Map, phf_map};

static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2,
    "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8, "F" => 9, "Ne" => 10,
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16, "Cl" => 17, "Ar" => 18,
    "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22, "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26,
    "Co" => 27, "Ni" => 28, "Cu" => 29, "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34,
    "Br" => 35, "Kr" => 36, "I" => 53,
};

// Standard atomic weights (IUPAC, conventional values), g/mol.
static ATOMIC_MASSES: Map<&'static str, f64> = phf_map! {
    "H" => 1.008, "He" => 4.002602,
    "Li" => 6.94, "Be" => 9.0121831, "B" => 10.81, "C" => 12.011, "N" => 14.007,
    "O" => 15.999, "F" => 18.998403163, "Ne" => 20.1797,
    "Na" => 22.98976928, "Mg" => 24.305, "Al" => 26.9815385, "Si" => 28.085,
    "P" => 30.973761998, "S" => 32.06, "Cl" => 35.45, "Ar" => 39.948,
    "K" => 39.0983, "Ca" => 40.078, "Sc" => 44.955908, "Ti" => 47.867, "V" => 50.9415,
    "Cr" => 51.9961, "Mn" => 54.938044, "Fe" => 55.845, "Co" => 58.933194, "Ni" => 58.6934,
    "Cu" => 63.546, "Zn" => 65.38, "Ga" => 69.723, "Ge" => 72.630, "As" => 74.921595,
    "Se" => 78.971, "Br" => 79.904, "Kr" => 83.798, "I" => 126.90447,
};

/// Returns the atomic number of an element symbol (e.g. `"C"` -> 6).
pub fn atomic_number(symbol: &str) -> Option<u8> {
    ATOMIC_NUMBERS.get(symbol.trim()).copied()
}

/// Returns the standard atomic mass of an element symbol in g/mol.
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    ATOMIC_MASSES.get(symbol.trim()).copied()
}

pub fn is_known_element(symbol: &str) -> bool {
    ATOMIC_NUMBERS.contains_key(symbol.trim())
}
