use rand::seq::SliceRandom;

/// Display colors handed out to users on join.
pub const USER_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8",
    "#F7DC6F", "#BB8FCE", "#85C1E2", "#F8B739", "#52B788",
];

/// Pick a display color at random.
pub fn random_color() -> String {
    USER_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_COLORS[0])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_color_from_palette() {
        for _ in 0..50 {
            let color = random_color();
            assert!(USER_COLORS.contains(&color.as_str()));
        }
    }
}
