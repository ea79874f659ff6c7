//! Typed request/response shapes of the simulator service
//!
//! Everything the reconciler reads from the simulator passes through these
//! types; malformed or unexpected payloads are rejected here, at the client
//! boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::simulation::RemoteStatus;

/// Body of a game submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitGameRequest {
    pub lineup_1: [Uuid; 5],
    pub lineup_2: [Uuid; 5],
    pub published: bool,
}

/// Simulator acknowledgement of a submission
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedGame {
    /// Opaque handle used for every later poll
    pub id: String,
}

/// Raw `GET /games/{id}/` body, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawGameResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<RawResultPayload>,
}

/// Validated poll outcome
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteGame {
    Pending,
    Started,
    Finished(Box<RawResultPayload>),
}

impl RemoteGame {
    pub fn status(&self) -> RemoteStatus {
        match self {
            RemoteGame::Pending => RemoteStatus::Pending,
            RemoteGame::Started => RemoteStatus::Started,
            RemoteGame::Finished(_) => RemoteStatus::Finished,
        }
    }
}

impl TryFrom<RawGameResponse> for RemoteGame {
    type Error = String;

    fn try_from(raw: RawGameResponse) -> Result<Self, Self::Error> {
        let status: RemoteStatus = raw.status.parse()?;
        match status {
            RemoteStatus::Pending => Ok(RemoteGame::Pending),
            RemoteStatus::Started => Ok(RemoteGame::Started),
            RemoteStatus::Finished => raw
                .result
                .map(|result| RemoteGame::Finished(Box::new(result)))
                .ok_or_else(|| "FINISHED game carries no result".to_string()),
        }
    }
}

/// Which lineup a box score belongs to, as tagged by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Lineup 1
    Challengers,
    /// Lineup 2
    Challenged,
}

impl Side {
    pub fn lineup(&self) -> i16 {
        match self {
            Side::Challengers => 1,
            Side::Challenged => 2,
        }
    }
}

/// Numeric box score fields; anything else in the payload is ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxScoreStats {
    #[serde(rename = "AST")]
    pub ast: i32,
    #[serde(rename = "BLK")]
    pub blk: i32,
    #[serde(rename = "DRB")]
    pub drb: i32,
    #[serde(rename = "ORB")]
    pub orb: i32,
    #[serde(rename = "TRB")]
    pub trb: i32,
    #[serde(rename = "FG")]
    pub fg: i32,
    #[serde(rename = "FGA")]
    pub fga: i32,
    #[serde(rename = "FG%")]
    pub fg_pct: Option<f64>,
    #[serde(rename = "3P")]
    pub three_p: i32,
    #[serde(rename = "3PA")]
    pub three_pa: i32,
    #[serde(rename = "3P%")]
    pub three_p_pct: Option<f64>,
    #[serde(rename = "2P")]
    pub two_p: i32,
    #[serde(rename = "2PA")]
    pub two_pa: i32,
    #[serde(rename = "2P%")]
    pub two_p_pct: Option<f64>,
    #[serde(rename = "FT")]
    pub ft: i32,
    #[serde(rename = "FTA")]
    pub fta: i32,
    #[serde(rename = "FT%")]
    pub ft_pct: Option<f64>,
    #[serde(rename = "STL")]
    pub stl: i32,
    #[serde(rename = "TOV")]
    pub tov: i32,
    #[serde(rename = "PF")]
    pub pf: i32,
    #[serde(rename = "PTS")]
    pub pts: i32,
}

/// One box score entry of a finished game. Team totals carry no
/// `canonical` player name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBoxScore {
    #[serde(rename = "Team")]
    pub side: Side,
    #[serde(default)]
    pub canonical: Option<String>,
    #[serde(flatten)]
    pub stats: BoxScoreStats,
}

impl RawBoxScore {
    pub fn is_team_total(&self) -> bool {
        self.canonical.is_none()
    }
}

/// A play-by-play entry. Read with the simulator's `Possession` and
/// `pbp_string` keys, stored as `possession` and `detail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    #[serde(
        rename(serialize = "possession", deserialize = "Possession"),
        default
    )]
    pub possession: serde_json::Value,
    #[serde(rename(serialize = "detail", deserialize = "pbp_string"), default)]
    pub detail: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result section of a FINISHED game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResultPayload {
    /// 2 team totals + 10 player entries
    pub box_scores: Vec<RawBoxScore>,
    /// Canonical player name → player uuid
    #[serde(default)]
    pub players: HashMap<String, Uuid>,
    #[serde(default)]
    pub pbp: Vec<PlayEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlayerAttributes {
    pub three_pt_rating: Option<i32>,
    pub interior_2pt_rating: Option<i32>,
    pub midrange_2pt_rating: Option<i32>,
    pub ft_rating: Option<i32>,
    pub drb_rating: Option<i32>,
    pub orb_rating: Option<i32>,
    pub ast_rating: Option<i32>,
    pub physicality_rating: Option<i32>,
    pub interior_defense_rating: Option<i32>,
    pub perimeter_defense_rating: Option<i32>,
    pub longevity_rating: Option<i32>,
    pub hustle_rating: Option<i32>,
    pub bball_iq_rating: Option<i32>,
    pub leadership_rating: Option<i32>,
    pub coachability_rating: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVisualAttributes {
    pub hair: Option<String>,
    pub skin_tone: Option<String>,
    pub jersey: Option<String>,
}

/// Player record from the simulator's listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlayerPayload {
    pub uuid: Uuid,
    #[serde(default)]
    pub token: Option<i64>,
    pub full_name: String,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub star_rating: Option<i32>,
    #[serde(default)]
    pub attributes: RawPlayerAttributes,
    #[serde(default)]
    pub visual_attributes: RawVisualAttributes,
    #[serde(default)]
    pub top_attributes: Vec<String>,
    #[serde(default)]
    pub positions: Vec<String>,
}

/// One page of the cursor-paginated player listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerPage {
    pub results: Vec<RawPlayerPayload>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Aggregate stats the simulator keeps per player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatPayload {
    pub uuid: Uuid,
    #[serde(default)]
    pub games_played: i32,
    #[serde(default)]
    pub wins: i32,
    #[serde(default)]
    pub losses: i32,
    #[serde(default)]
    pub points_avg: Option<f64>,
    #[serde(default)]
    pub rebounds_avg: Option<f64>,
    #[serde(default)]
    pub assists_avg: Option<f64>,
}
