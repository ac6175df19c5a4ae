//! Nintendo licensee ("maker") codes.
//!
//! Two-character codes used in GameCube, Wii and Game Boy Advance headers.

/// Sorted by code for binary search.
const PUBLISHERS: &[(&str, &str)] = &[
    ("01", "Nintendo"),
    ("08", "Capcom"),
    ("0A", "Jaleco"),
    ("13", "Electronic Arts Japan"),
    ("18", "Hudson Soft"),
    ("20", "Destination Software"),
    ("41", "Ubisoft"),
    ("4F", "Eidos"),
    ("4Q", "Disney Interactive"),
    ("4Z", "Crave Entertainment"),
    ("51", "Acclaim"),
    ("52", "Activision"),
    ("54", "Take-Two Interactive"),
    ("5D", "Midway"),
    ("5G", "Majesco"),
    ("5H", "3DO"),
    ("5Q", "LEGO Media"),
    ("5S", "Xicat Interactive"),
    ("5Z", "Conspiracy Entertainment"),
    ("60", "Titus"),
    ("64", "LucasArts"),
    ("69", "Electronic Arts"),
    ("6E", "Sega"),
    ("6K", "UFO Interactive"),
    ("6S", "TDK Mediactive"),
    ("6V", "JoWooD"),
    ("70", "Infogrames"),
    ("78", "THQ"),
    ("7D", "Vivendi Universal"),
    ("7G", "Rage Software"),
    ("7N", "Empire Interactive"),
    ("7Q", "Mastiff"),
    ("8J", "Kadokawa Shoten"),
    ("8P", "Sega"),
    ("99", "Marvelous Entertainment"),
    ("9B", "Tecmo"),
    ("A4", "Konami"),
    ("AF", "Namco"),
    ("B0", "Acclaim Japan"),
    ("B2", "Bandai"),
    ("B6", "HAL Laboratory"),
    ("C8", "Koei"),
    ("DA", "Tomy"),
    ("E7", "Athena"),
    ("E9", "Natsume"),
    ("EB", "Atlus"),
    ("FH", "Bandai Namco"),
    ("FK", "The Game Factory"),
    ("G9", "D3 Publisher"),
    ("GD", "Square Enix"),
    ("GT", "505 Games"),
    ("HF", "Level-5"),
    ("KM", "Deep Silver"),
    ("WR", "Warner Bros. Interactive"),
];

/// Publisher name for a two-character maker code.
pub fn lookup(code: &str) -> Option<&'static str> {
    PUBLISHERS
        .binary_search_by(|(c, _)| (*c).cmp(code))
        .ok()
        .map(|i| PUBLISHERS[i].1)
}

/// Publisher name, or `"Unknown (XX)"` for unlisted codes.
pub fn name_or_code(code: &str) -> String {
    match lookup(code) {
        Some(name) => name.to_owned(),
        None => format!("Unknown ({code})"),
    }
}
