//! Embedded species-name table.
//!
//! Resolution is deliberately offline: a small table of well-known species,
//! and a synthesized `pokemon_<id>` placeholder for everything else. Nothing in
//! the reconciliation path calls out to an external species API.

use crate::PokemonId;
use std::borrow::Cow;

/// Known species, sorted by id for binary search.
const KNOWN_POKEMON: &[(PokemonId, &str)] = &[
    (1, "bulbasaur"),
    (2, "ivysaur"),
    (3, "venusaur"),
    (4, "charmander"),
    (5, "charmeleon"),
    (6, "charizard"),
    (7, "squirtle"),
    (8, "wartortle"),
    (9, "blastoise"),
    (10, "caterpie"),
    (16, "pidgey"),
    (19, "rattata"),
    (25, "pikachu"),
    (26, "raichu"),
    (35, "clefairy"),
    (39, "jigglypuff"),
    (52, "meowth"),
    (54, "psyduck"),
    (63, "abra"),
    (74, "geodude"),
    (92, "gastly"),
    (94, "gengar"),
    (95, "onix"),
    (104, "cubone"),
    (129, "magikarp"),
    (130, "gyarados"),
    (131, "lapras"),
    (132, "ditto"),
    (133, "eevee"),
    (134, "vaporeon"),
    (135, "jolteon"),
    (136, "flareon"),
    (143, "snorlax"),
    (144, "articuno"),
    (145, "zapdos"),
    (146, "moltres"),
    (147, "dratini"),
    (149, "dragonite"),
    (150, "mewtwo"),
    (151, "mew"),
];

/// Look up a species name in the embedded table.
pub fn known_name(pokemon_id: PokemonId) -> Option<&'static str> {
    KNOWN_POKEMON
        .binary_search_by_key(&pokemon_id, |(id, _)| *id)
        .ok()
        .map(|idx| KNOWN_POKEMON[idx].1)
}

/// Resolve a display name, falling back to `pokemon_<id>`.
pub fn pokemon_name(pokemon_id: PokemonId) -> Cow<'static, str> {
    match known_name(pokemon_id) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("pokemon_{}", pokemon_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        assert!(KNOWN_POKEMON.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn resolves_known_ids() {
        assert_eq!(pokemon_name(25), "pikachu");
        assert_eq!(pokemon_name(6), "charizard");
        assert_eq!(pokemon_name(151), "mew");
    }

    #[test]
    fn falls_back_to_placeholder() {
        assert_eq!(known_name(999), None);
        assert_eq!(pokemon_name(999), "pokemon_999");
        assert_eq!(pokemon_name(0), "pokemon_0");
    }
}
