//! Hierarchy assembler
//!
//! Read-only projections of the Category → Skill → SubSkill → Challenge tree
//! and the profile's aggregate XP. Nothing here is cached; every call reads
//! the current documents.

use bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schemas::{AchievementDoc, CategoryDoc, ChallengeDoc, SkillDoc, SubSkillDoc};
use crate::db::{Entity, ListFilter, SkillStore, Store};
use crate::leveling::{add_xp, LevelProgress, XpPool};
use crate::services::Catalog;
use crate::types::views::{CategoryView, ChallengeView, SkillView, SubSkillView};
use crate::types::Result;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSkillTree {
    #[serde(flatten)]
    pub sub_skill: SubSkillView,
    pub challenges: Vec<ChallengeView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTree {
    #[serde(flatten)]
    pub skill: SkillView,
    pub sub_skills: Vec<SubSkillTree>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: CategoryView,
    pub skills: Vec<SkillTree>,
}

/// Aggregate figures for one profile
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    /// Sum of the profile's category XP and skill XP
    pub total_xp: i64,
    pub total_level: i64,
    pub progress: LevelProgress,
    pub categories: usize,
    pub skills: usize,
    pub sub_skills: usize,
    pub challenges: usize,
    pub achievements: usize,
}

impl ProfileStats {
    /// Aggregate over the owned categories and skills
    pub fn from_pools(categories: &[CategoryDoc], skills: &[SkillDoc]) -> Result<Self> {
        let total_xp = categories
            .iter()
            .map(|c| c.xp)
            .chain(skills.iter().map(|s| s.xp))
            .try_fold(0_i64, add_xp)?;
        Ok(Self {
            total_xp,
            total_level: XpPool::Profile.level(total_xp),
            progress: LevelProgress::new(XpPool::Profile, total_xp),
            categories: categories.len(),
            skills: skills.len(),
            sub_skills: 0,
            challenges: 0,
            achievements: 0,
        })
    }
}

/// Every document below the category level for one profile, grouped by
/// parent id. Each group keeps the store's listing order.
struct Forest {
    skills: HashMap<ObjectId, Vec<SkillDoc>>,
    sub_skills: HashMap<ObjectId, Vec<SubSkillDoc>>,
    challenges: HashMap<ObjectId, Vec<ChallengeDoc>>,
}

fn group<T: Entity>(docs: Vec<T>) -> HashMap<ObjectId, Vec<T>> {
    let mut grouped: HashMap<ObjectId, Vec<T>> = HashMap::new();
    for doc in docs {
        grouped.entry(doc.parent_id()).or_default().push(doc);
    }
    grouped
}

fn children<'a, T>(map: &'a HashMap<ObjectId, Vec<T>>, parent: Option<ObjectId>) -> &'a [T] {
    parent
        .and_then(|id| map.get(&id))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

impl Forest {
    fn sub_skill_tree(&self, sub_skill: &SubSkillDoc) -> SubSkillTree {
        SubSkillTree {
            sub_skill: SubSkillView::from(sub_skill),
            challenges: children(&self.challenges, sub_skill._id)
                .iter()
                .map(ChallengeView::from)
                .collect(),
        }
    }

    fn skill_tree(&self, skill: &SkillDoc) -> SkillTree {
        SkillTree {
            skill: SkillView::from(skill),
            sub_skills: children(&self.sub_skills, skill._id)
                .iter()
                .map(|s| self.sub_skill_tree(s))
                .collect(),
        }
    }

    fn category_tree(&self, category: &CategoryDoc) -> CategoryTree {
        CategoryTree {
            category: CategoryView::from(category),
            skills: children(&self.skills, category._id)
                .iter()
                .map(|s| self.skill_tree(s))
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct HierarchyAssembler {
    store: Arc<Store>,
    catalog: Catalog,
}

impl HierarchyAssembler {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&store)),
            store,
        }
    }

    async fn forest(&self, profile: ObjectId) -> Result<Forest> {
        let owned = ListFilter::owned_by(profile);
        Ok(Forest {
            skills: group(self.store.list::<SkillDoc>(owned).await?),
            sub_skills: group(self.store.list::<SubSkillDoc>(owned).await?),
            challenges: group(self.store.list::<ChallengeDoc>(owned).await?),
        })
    }

    pub async fn category_tree(&self, profile: ObjectId, id: ObjectId) -> Result<CategoryTree> {
        let category = self.catalog.owned::<CategoryDoc>(profile, id).await?;
        Ok(self.forest(profile).await?.category_tree(&category))
    }

    pub async fn skill_tree(&self, profile: ObjectId, id: ObjectId) -> Result<SkillTree> {
        let skill = self.catalog.owned::<SkillDoc>(profile, id).await?;
        Ok(self.forest(profile).await?.skill_tree(&skill))
    }

    /// Every category of the profile as a nested tree, by name
    pub async fn profile_tree(&self, profile: ObjectId) -> Result<Vec<CategoryTree>> {
        let categories = self
            .store
            .list::<CategoryDoc>(ListFilter::owned_by(profile))
            .await?;
        let forest = self.forest(profile).await?;
        Ok(categories.iter().map(|c| forest.category_tree(c)).collect())
    }

    pub async fn stats(&self, profile: ObjectId) -> Result<ProfileStats> {
        let owned = ListFilter::owned_by(profile);
        let categories = self.store.list::<CategoryDoc>(owned).await?;
        let skills = self.store.list::<SkillDoc>(owned).await?;

        let mut stats = ProfileStats::from_pools(&categories, &skills)?;
        stats.sub_skills = self.store.list::<SubSkillDoc>(owned).await?.len();
        stats.challenges = self.store.list::<ChallengeDoc>(owned).await?.len();
        stats.achievements = self.store.list::<AchievementDoc>(owned).await?.len();
        Ok(stats)
    }
}
