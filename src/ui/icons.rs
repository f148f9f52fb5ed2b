pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✅";
    pub const STATS: &str = "📊";
    pub const PERSON: &str = "👤";
    pub const LINK: &str = "🔗";
    pub const EMPTY: &str = "∅";
}
