pub mod activity;
pub mod lead;
pub mod team;

pub use activity::{Activity, ActivityFilter, ActivityRecord, ActivityType, NewActivity};
pub use lead::{Lead, LeadFilter, LeadUpdate, LeadView, NewLead, NewObjection, Objection, Temperature};
pub use team::{
    AddMemberRequest, Directory, DirectoryMembership, RegisterUserRequest, Role, TeamRole, User,
    UserTeam,
};
