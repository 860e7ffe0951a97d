use crate::{EducationId, ExperienceId, ProfileId, ProfileInput, Time, UserId};

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Social {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Experience {
    #[serde(rename = "_id")]
    pub id: ExperienceId,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub from: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Time>,
    #[serde(default)]
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Education {
    #[serde(rename = "_id")]
    pub id: EducationId,
    pub school: String,
    pub degree: String,
    pub fieldofstudy: String,
    pub from: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Time>,
    #[serde(default)]
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: ProfileId,

    /// Owner, one profile per user
    pub user: UserId,

    /// Unique across all profiles
    pub handle: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub status: String,
    pub skills: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub githubusername: Option<String>,

    /// Newest first
    pub experience: Vec<Experience>,

    /// Newest first
    pub education: Vec<Education>,

    #[serde(default)]
    pub social: Social,

    pub date: Time,
}

fn overwrite(field: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *field = value;
    }
}

impl Profile {
    /// Builds a fresh profile from already-validated input
    pub fn new(id: ProfileId, user: UserId, date: Time, input: ProfileInput) -> Profile {
        let mut p = Profile {
            id,
            user,
            handle: String::new(),
            company: None,
            website: None,
            location: None,
            status: String::new(),
            skills: Vec::new(),
            bio: None,
            githubusername: None,
            experience: Vec::new(),
            education: Vec::new(),
            social: Social::default(),
            date,
        };
        p.apply(input);
        p
    }

    /// Overwrites every field present in `input`, keeping the others
    pub fn apply(&mut self, input: ProfileInput) {
        if let Some(handle) = input.handle {
            self.handle = handle;
        }
        if let Some(status) = input.status {
            self.status = status;
        }
        if let Some(skills) = input.skills {
            self.skills = skills;
        }
        overwrite(&mut self.company, input.company);
        overwrite(&mut self.website, input.website);
        overwrite(&mut self.location, input.location);
        overwrite(&mut self.bio, input.bio);
        overwrite(&mut self.githubusername, input.githubusername);
        overwrite(&mut self.social.youtube, input.youtube);
        overwrite(&mut self.social.twitter, input.twitter);
        overwrite(&mut self.social.facebook, input.facebook);
        overwrite(&mut self.social.linkedin, input.linkedin);
        overwrite(&mut self.social.instagram, input.instagram);
    }

    pub fn add_experience(&mut self, e: Experience) {
        self.experience.insert(0, e);
    }

    pub fn add_education(&mut self, e: Education) {
        self.education.insert(0, e);
    }

    pub fn remove_experience(&mut self, id: ExperienceId) -> Option<Experience> {
        let idx = self.experience.iter().position(|e| e.id == id)?;
        Some(self.experience.remove(idx))
    }

    pub fn remove_education(&mut self, id: EducationId) -> Option<Education> {
        let idx = self.education.iter().position(|e| e.id == id)?;
        Some(self.education.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProfileInput {
        serde_json::from_value(serde_json::json!({
            "handle": "alice",
            "status": "Developer",
            "skills": "rust, sql,,go ",
            "website": "alice.dev",
            "twitter": "https://twitter.com/alice",
        }))
        .unwrap()
    }

    fn experience(title: &str) -> Experience {
        Experience {
            id: ExperienceId::random(),
            title: String::from(title),
            company: String::from("Initech"),
            location: None,
            from: Time::from(std::time::UNIX_EPOCH),
            to: None,
            current: true,
            description: None,
        }
    }

    #[test]
    fn new_profile_takes_input_fields() {
        let user = UserId::random();
        let p = Profile::new(ProfileId::random(), user, chrono::Utc::now(), input());
        assert_eq!(p.user, user);
        assert_eq!(p.handle, "alice");
        assert_eq!(p.skills, vec!["rust", "sql", "go"]);
        assert_eq!(p.website.as_deref(), Some("alice.dev"));
        assert_eq!(
            p.social.twitter.as_deref(),
            Some("https://twitter.com/alice")
        );
        assert_eq!(p.social.youtube, None);
        assert!(p.experience.is_empty() && p.education.is_empty());
    }

    #[test]
    fn apply_keeps_absent_fields() {
        let mut p = Profile::new(
            ProfileId::random(),
            UserId::random(),
            chrono::Utc::now(),
            input(),
        );
        p.add_experience(experience("Engineer"));
        let update: ProfileInput = serde_json::from_value(serde_json::json!({
            "handle": "alice2",
            "status": "Lead",
            "skills": ["rust"],
            "bio": "hi",
        }))
        .unwrap();
        p.apply(update);
        assert_eq!(p.handle, "alice2");
        assert_eq!(p.status, "Lead");
        assert_eq!(p.skills, vec!["rust"]);
        assert_eq!(p.bio.as_deref(), Some("hi"));
        assert_eq!(p.website.as_deref(), Some("alice.dev"));
        assert_eq!(p.experience.len(), 1);
    }

    #[test]
    fn entries_newest_first_and_removed_by_id() {
        let mut p = Profile::new(
            ProfileId::random(),
            UserId::random(),
            chrono::Utc::now(),
            input(),
        );
        let (a, b) = (experience("Intern"), experience("Engineer"));
        p.add_experience(a.clone());
        p.add_experience(b.clone());
        assert_eq!(p.experience, vec![b.clone(), a.clone()]);
        assert_eq!(p.remove_experience(ExperienceId::random()), None);
        assert_eq!(p.experience.len(), 2);
        assert_eq!(p.remove_experience(a.id), Some(a));
        assert_eq!(p.experience, vec![b]);
        assert_eq!(p.remove_education(EducationId::random()), None);
    }

    #[test]
    fn wire_format_uses_underscore_id() {
        let p = Profile::new(
            ProfileId::stub(),
            UserId::stub(),
            Time::from(std::time::UNIX_EPOCH),
            input(),
        );
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["_id"], serde_json::json!(ProfileId::stub()));
        assert_eq!(json["social"], serde_json::json!({ "twitter": "https://twitter.com/alice" }));
        assert!(json.get("bio").is_none());
        let back: Profile = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
