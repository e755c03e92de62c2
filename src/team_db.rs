use once_cell::sync::Lazy;
use std::collections::HashMap;

const LOGO_BASE: &str = "https://a.espncdn.com/i/teamlogos/nba/500";

/// Static per-team reference row. Record fields are a season snapshot; the live
/// schedule feed overrides wins/losses when it carries them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub name_zh: &'static str,
    pub wins: u32,
    pub losses: u32,
    pub ppg: f64,
    pub oppg: f64,
    pub last10: &'static str,
    pub logo_slug: &'static str,
}

impl TeamEntry {
    pub fn logo_url(&self) -> String {
        format!("{LOGO_BASE}/{}.png", self.logo_slug)
    }
}

#[allow(clippy::too_many_arguments)]
const fn entry(
    id: &'static str,
    name: &'static str,
    name_zh: &'static str,
    wins: u32,
    losses: u32,
    ppg: f64,
    oppg: f64,
    last10: &'static str,
    logo_slug: &'static str,
) -> TeamEntry {
    TeamEntry {
        id,
        name,
        name_zh,
        wins,
        losses,
        ppg,
        oppg,
        last10,
        logo_slug,
    }
}

// Eastern conference first, then western.
const TEAMS: &[TeamEntry] = &[
    entry("BOS", "Celtics", "塞爾提克", 45, 12, 120.8, 110.5, "9-1", "bos"),
    entry("MIL", "Bucks", "公鹿", 35, 21, 122.1, 118.5, "5-5", "mil"),
    entry("CLE", "Cavaliers", "騎士", 36, 19, 115.2, 110.1, "7-3", "cle"),
    entry("NYK", "Knicks", "尼克", 33, 22, 114.5, 109.8, "6-4", "nyk"),
    entry("PHI", "76ers", "76人", 32, 23, 117.5, 113.2, "3-7", "phi"),
    entry("IND", "Pacers", "溜馬", 31, 25, 123.5, 122.1, "5-5", "ind"),
    entry("MIA", "Heat", "熱火", 30, 25, 110.6, 109.8, "6-4", "mia"),
    entry("ORL", "Magic", "魔術", 30, 25, 111.8, 110.9, "7-3", "orl"),
    entry("CHI", "Bulls", "公牛", 26, 29, 111.9, 113.2, "5-5", "chi"),
    entry("ATL", "Hawks", "老鷹", 24, 31, 121.2, 123.8, "4-6", "atl"),
    entry("BKN", "Nets", "籃網", 21, 33, 113.5, 115.8, "3-7", "bkn"),
    entry("TOR", "Raptors", "暴龍", 19, 36, 114.2, 117.5, "3-7", "tor"),
    entry("CHA", "Hornets", "黃蜂", 13, 41, 108.5, 119.8, "3-7", "cha"),
    entry("WAS", "Wizards", "巫師", 9, 45, 114.8, 124.2, "0-10", "was"),
    entry("DET", "Pistons", "活塞", 8, 46, 112.5, 122.1, "2-8", "det"),
    entry("MIN", "Timberwolves", "灰狼", 39, 16, 113.8, 106.5, "7-3", "min"),
    entry("OKC", "Thunder", "雷霆", 37, 17, 120.8, 113.2, "6-4", "okc"),
    entry("LAC", "Clippers", "快艇", 36, 17, 118.2, 112.5, "7-3", "lac"),
    entry("DEN", "Nuggets", "金塊", 36, 19, 114.2, 110.8, "6-4", "den"),
    entry("PHX", "Suns", "太陽", 33, 22, 117.5, 114.5, "7-3", "phx"),
    entry("NOP", "Pelicans", "鵜鶘", 33, 22, 116.5, 112.8, "7-3", "nop"),
    entry("DAL", "Mavericks", "獨行俠", 32, 23, 118.8, 117.5, "6-4", "dal"),
    entry("SAC", "Kings", "國王", 31, 23, 118.5, 117.8, "5-5", "sac"),
    entry("LAL", "Lakers", "湖人", 30, 26, 116.8, 117.2, "6-4", "lal"),
    entry("GSW", "Warriors", "勇士", 27, 26, 119.5, 118.2, "7-3", "gsw"),
    entry("UTA", "Jazz", "爵士", 26, 30, 117.5, 120.2, "4-6", "uta"),
    entry("HOU", "Rockets", "火箭", 24, 30, 113.5, 112.8, "3-7", "hou"),
    entry("MEM", "Grizzlies", "灰熊", 20, 36, 106.8, 112.5, "2-8", "mem"),
    entry("POR", "Trail Blazers", "拓荒者", 15, 39, 107.8, 116.5, "2-8", "por"),
    entry("SAS", "Spurs", "馬刺", 11, 44, 112.2, 120.5, "1-9", "sas"),
];

static BY_ID: Lazy<HashMap<&'static str, &'static TeamEntry>> =
    Lazy::new(|| TEAMS.iter().map(|t| (t.id, t)).collect());

// Short codes the schedule feed uses where they differ from the table ids.
const FEED_ALIASES: &[(&str, &str)] = &[
    ("GS", "GSW"),
    ("NY", "NYK"),
    ("NO", "NOP"),
    ("SA", "SAS"),
    ("UTAH", "UTA"),
    ("WSH", "WAS"),
    ("BRK", "BKN"),
    ("PHO", "PHX"),
];

/// Upper-cases an abbreviation and folds feed-specific short codes onto table ids.
pub fn canonical_id(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    FEED_ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, id)| (*id).to_string())
        .unwrap_or(upper)
}

/// Looks up a team by abbreviation (case-insensitive, feed aliases accepted).
pub fn lookup(id: &str) -> Option<&'static TeamEntry> {
    let key = canonical_id(id);
    BY_ID.get(key.as_str()).copied()
}

pub fn all_teams() -> &'static [TeamEntry] {
    TEAMS
}
