//! Profiles, one per user, with their experience and education entries

use anyhow::Context;
use devconnect_api::{
    now, EducationId, EducationInput, Error as ApiError, ExperienceId, ExperienceInput, Outcome,
    Profile, ProfileId, ProfileInput, ProfileStore, UserId,
};

use crate::Error;

fn settle(outcome: Outcome<Profile>) -> Result<Profile, Error> {
    match outcome {
        Outcome::Done(p) => Ok(p),
        Outcome::Missing => Err(Error::Api(ApiError::NoProfile)),
        Outcome::Declined(e) => Err(Error::Api(e)),
    }
}

pub async fn current(store: &dyn ProfileStore, user: UserId) -> Result<Profile, Error> {
    store
        .fetch_profile(user)
        .await
        .with_context(|| format!("fetching profile of user {user}"))?
        .ok_or(Error::Api(ApiError::NoProfile))
}

pub async fn all(store: &dyn ProfileStore) -> Result<Vec<Profile>, Error> {
    let profiles = store.list_profiles().await.context("listing profiles")?;
    if profiles.is_empty() {
        return Err(Error::Api(ApiError::NoProfiles));
    }
    Ok(profiles)
}

pub async fn by_handle(store: &dyn ProfileStore, handle: &str) -> Result<Profile, Error> {
    store
        .fetch_profile_by_handle(handle)
        .await
        .with_context(|| format!("fetching profile with handle {handle:?}"))?
        .ok_or(Error::Api(ApiError::NoProfile))
}

pub async fn by_user(store: &dyn ProfileStore, user: Option<UserId>) -> Result<Profile, Error> {
    current(store, user.ok_or(Error::Api(ApiError::NoProfile))?).await
}

/// Creates the user's profile, or overwrites the fields given in `input`
pub async fn save(
    store: &dyn ProfileStore,
    user: UserId,
    input: ProfileInput,
) -> Result<Profile, Error> {
    input.validate()?;
    let outcome = store
        .save_profile(
            user,
            Box::new(move |existing: Option<Profile>| match existing {
                Some(mut p) => {
                    p.apply(input);
                    p
                }
                None => Profile::new(ProfileId::random(), user, now(), input),
            }),
        )
        .await
        .with_context(|| format!("saving profile of user {user}"))?;
    let profile = settle(outcome)?;
    tracing::info!(profile = %profile.id, %user, handle = %profile.handle, "saved profile");
    Ok(profile)
}

pub async fn delete(store: &dyn ProfileStore, user: UserId) -> Result<(), Error> {
    let existed = store
        .delete_profile(user)
        .await
        .with_context(|| format!("deleting profile of user {user}"))?;
    tracing::info!(%user, existed, "deleted profile");
    Ok(())
}

pub async fn add_experience(
    store: &dyn ProfileStore,
    user: UserId,
    input: ExperienceInput,
) -> Result<Profile, Error> {
    let experience = input.validate(ExperienceId::random())?;
    let outcome = store
        .update_profile(
            user,
            Box::new(move |p: &mut Profile| {
                p.add_experience(experience);
                Ok(())
            }),
        )
        .await
        .with_context(|| format!("adding experience to profile of user {user}"))?;
    settle(outcome)
}

pub async fn remove_experience(
    store: &dyn ProfileStore,
    user: UserId,
    id: Option<ExperienceId>,
) -> Result<Profile, Error> {
    let outcome = store
        .update_profile(
            user,
            Box::new(move |p: &mut Profile| {
                if let Some(id) = id {
                    p.remove_experience(id);
                }
                Ok(())
            }),
        )
        .await
        .with_context(|| format!("removing experience from profile of user {user}"))?;
    settle(outcome)
}

pub async fn add_education(
    store: &dyn ProfileStore,
    user: UserId,
    input: EducationInput,
) -> Result<Profile, Error> {
    let education = input.validate(EducationId::random())?;
    let outcome = store
        .update_profile(
            user,
            Box::new(move |p: &mut Profile| {
                p.add_education(education);
                Ok(())
            }),
        )
        .await
        .with_context(|| format!("adding education to profile of user {user}"))?;
    settle(outcome)
}

pub async fn remove_education(
    store: &dyn ProfileStore,
    user: UserId,
    id: Option<EducationId>,
) -> Result<Profile, Error> {
    let outcome = store
        .update_profile(
            user,
            Box::new(move |p: &mut Profile| {
                if let Some(id) = id {
                    p.remove_education(id);
                }
                Ok(())
            }),
        )
        .await
        .with_context(|| format!("removing education from profile of user {user}"))?;
    settle(outcome)
}
