//! Hero catalogue and persistent squad records
//!
//! Heroes unlock one at a time as the squad frees caged heroes. The roster is
//! the only state that outlives a run; see [`crate::persistence`] for storage.

use serde::{Deserialize, Serialize};

use crate::sim::entity::WeaponKind;
use crate::sim::entity::WeaponKind::{Boomerang, Gun, Laser, Magic, Melee, Spread};
use crate::sim::world::SlotStats;

/// A playable hero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeroDef {
    pub id: &'static str,
    pub name: &'static str,
    pub weapon: WeaponKind,
}

const fn hero(id: &'static str, name: &'static str, weapon: WeaponKind) -> HeroDef {
    HeroDef { id, name, weapon }
}

/// Every hero in unlock order
pub static HEROES: [HeroDef; 33] = [
    hero("pug", "IRON MUTT", Laser),
    hero("raccoon", "CPT TRASH", Boomerang),
    hero("cat", "BAT CAT", Boomerang),
    hero("corgi", "THOR-GI", Boomerang),
    hero("hulk", "HULK-POODLE", Melee),
    hero("spider", "SPIDER-PIG", Gun),
    hero("wolvie", "WOLVER-WEENIE", Melee),
    hero("dead", "DEAD-POODLE", Gun),
    hero("cap", "CAPTAIN EAGLE", Boomerang),
    hero("ironmouse", "IRON-MOUSE", Laser),
    hero("widow", "BLACK WIDOW-PUG", Gun),
    hero("hawkeye", "HAWK-HEDGEHOG", Spread),
    hero("strange", "DR STRANGE-CAT", Magic),
    hero("panther", "BLACK PANTHER", Melee),
    hero("ant", "ANT-EATER-MAN", Melee),
    hero("starlord", "STAR-LORD-FOX", Laser),
    hero("gamora", "GAMORA-GECKO", Melee),
    hero("drax", "DRAX-BULLDOG", Melee),
    hero("groot", "GROOT-BARK", Melee),
    hero("rocket", "ROCKET-RABBIT", Spread),
    hero("vision", "VISION-ZEBRA", Laser),
    hero("scarlet", "SCARLET-SKUNK", Magic),
    hero("quick", "QUICK-CHEETAH", Melee),
    hero("winter", "WINTER-WOLF", Gun),
    hero("falcon", "FALCON-PIGEON", Gun),
    hero("war", "WAR-RHINO", Spread),
    hero("dare", "DAREDEVIL-DOG", Melee),
    hero("punish", "PUNISHER-PENGUIN", Spread),
    hero("shang", "SHANG-CHI-PANDA", Melee),
    hero("eternal", "ETERNAL-ELEPHANT", Magic),
    hero("moon", "MOON-OWL", Boomerang),
    hero("shehulk", "SHE-HULK-HAMSTER", Melee),
    hero("ghost", "GHOST-GOAT", Melee),
];

/// Lifetime tallies for one hero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRecord {
    pub kills: u32,
    pub rescues: u32,
    pub levels_cleared: u32,
    pub deaths: u32,
    /// Points earned while playing this hero
    #[serde(default)]
    pub score: u64,
}

/// Persistent squad records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Number of heroes available, counted from the start of [`HEROES`]
    pub unlocked: usize,
    /// Caged heroes freed across all runs
    pub total_rescues: u32,
    /// One record per entry of [`HEROES`]
    pub records: Vec<RosterRecord>,
    /// Highest squad score of any finished run
    #[serde(default)]
    pub best_score: u32,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self {
            unlocked: 1,
            total_rescues: 0,
            records: vec![RosterRecord::default(); HEROES.len()],
            best_score: 0,
        }
    }

    /// Repair a roster read from storage (short record list, bad unlock count)
    pub fn normalized(mut self) -> Self {
        self.records.resize(HEROES.len(), RosterRecord::default());
        self.unlocked = self.unlocked.clamp(1, HEROES.len());
        self
    }

    pub fn is_unlocked(&self, hero: usize) -> bool {
        hero < self.unlocked
    }

    /// Unlocked heroes in catalogue order
    pub fn available(&self) -> impl Iterator<Item = (usize, &'static HeroDef)> {
        HEROES.iter().enumerate().take(self.unlocked)
    }

    pub fn record(&self, hero: usize) -> Option<&RosterRecord> {
        self.records.get(hero)
    }

    /// Rescues needed before the next hero unlocks
    pub fn next_unlock_at(&self) -> u32 {
        2 * self.unlocked as u32 - 1
    }

    /// Count a freed hero. Returns the index of a newly unlocked hero, if any.
    pub fn record_rescue(&mut self, by_hero: usize) -> Option<usize> {
        self.total_rescues += 1;
        if let Some(rec) = self.records.get_mut(by_hero) {
            rec.rescues += 1;
        }
        if self.unlocked < HEROES.len() && self.total_rescues >= self.next_unlock_at() {
            self.unlocked += 1;
            let hero = self.unlocked - 1;
            log::info!("Unlocked hero {}", HEROES[hero].name);
            return Some(hero);
        }
        None
    }

    /// Fold one level's per-slot tallies into the hero records
    ///
    /// `squad` maps slot to hero. Rescues go through [`Roster::record_rescue`]
    /// so they can unlock heroes.
    pub fn fold_stats(&mut self, squad: &[(usize, usize)], stats: &[SlotStats], cleared: bool) -> Vec<usize> {
        let mut unlocked = Vec::new();
        for &(slot, hero) in squad {
            let Some(tally) = stats.get(slot) else {
                continue;
            };
            for _ in 0..tally.rescues {
                unlocked.extend(self.record_rescue(hero));
            }
            if let Some(rec) = self.records.get_mut(hero) {
                rec.kills += tally.kills;
                rec.deaths += tally.downs;
                rec.score += u64::from(tally.score);
                if cleared {
                    rec.levels_cleared += 1;
                }
            }
        }
        unlocked
    }

    /// Record a finished run's squad score. Returns true for a new best.
    pub fn record_run_score(&mut self, score: u32) -> bool {
        if score > self.best_score {
            log::info!("new best score {score} (was {})", self.best_score);
            self.best_score = score;
            true
        } else {
            false
        }
    }

    /// Squad-wide kill count
    pub fn total_kills(&self) -> u32 {
        self.records.iter().map(|r| r.kills).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue() {
        assert_eq!(HEROES.len(), 33);
        assert_eq!(HEROES[0].name, "IRON MUTT");
        let roster = Roster::new();
        assert_eq!(roster.available().count(), 1);
        assert!(roster.is_unlocked(0));
        assert!(!roster.is_unlocked(1));
    }

    #[test]
    fn test_unlock_thresholds() {
        let mut roster = Roster::new();
        // 1, 3, 5, ... rescues
        assert_eq!(roster.record_rescue(0), Some(1));
        assert_eq!(roster.record_rescue(0), None);
        assert_eq!(roster.record_rescue(0), Some(2));
        assert_eq!(roster.next_unlock_at(), 5);
        assert_eq!(roster.records[0].rescues, 3);
    }

    #[test]
    fn test_unlock_caps_at_catalogue() {
        let mut roster = Roster::new();
        for _ in 0..2000 {
            roster.record_rescue(0);
        }
        assert_eq!(roster.unlocked, HEROES.len());
    }

    #[test]
    fn test_fold_stats() {
        let mut roster = Roster::new();
        let mut stats = [SlotStats::default(); 4];
        stats[1] = SlotStats {
            kills: 4,
            rescues: 1,
            downs: 2,
            score: 900,
        };
        let unlocked = roster.fold_stats(&[(1, 0)], &stats, true);
        assert_eq!(unlocked, vec![1]);
        let rec = roster.record(0).unwrap();
        assert_eq!((rec.kills, rec.deaths, rec.levels_cleared), (4, 2, 1));
        assert_eq!(roster.total_kills(), 4);
        assert_eq!(rec.score, 900);
    }

    #[test]
    fn test_best_score_only_rises() {
        let mut roster = Roster::new();
        assert!(roster.record_run_score(1500));
        assert!(!roster.record_run_score(1200));
        assert!(!roster.record_run_score(1500));
        assert_eq!(roster.best_score, 1500);
    }

    #[test]
    fn test_normalized_repairs_short_records() {
        let roster = Roster {
            unlocked: 99,
            total_rescues: 0,
            records: vec![],
            best_score: 0,
        }
        .normalized();
        assert_eq!(roster.records.len(), HEROES.len());
        assert_eq!(roster.unlocked, HEROES.len());
    }
}
