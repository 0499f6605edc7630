//! Issue board operations and the issue wire model.

// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::{ApiHttpClient, ApiRequest},
	session::ValidationError,
	tracker::{Id, non_blank},
};

/// Issue category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
	/// Defect report.
	Bug,
	/// New functionality.
	Feature,
}

/// Board column an issue sits in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
	/// Not started.
	#[default]
	Open,
	/// Being worked on.
	InProgress,
	/// Awaiting verification.
	Testing,
	/// Finished.
	Done,
}

/// Issue priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
	/// Urgent.
	High,
	/// Normal.
	Medium,
	/// Whenever.
	Low,
}

/// Status transitions exposed by the backend as `PUT .../issues/{id}/{action}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueTransition {
	/// Move back to [`IssueStatus::Open`].
	Open,
	/// Move to [`IssueStatus::InProgress`].
	Progress,
	/// Move to [`IssueStatus::Testing`].
	Test,
	/// Move to [`IssueStatus::Done`].
	Done,
}
impl IssueTransition {
	/// Path segment naming the transition.
	pub const fn as_str(self) -> &'static str {
		match self {
			IssueTransition::Open => "open",
			IssueTransition::Progress => "progress",
			IssueTransition::Test => "test",
			IssueTransition::Done => "done",
		}
	}

	/// Status the issue ends up in.
	pub const fn target_status(self) -> IssueStatus {
		match self {
			IssueTransition::Open => IssueStatus::Open,
			IssueTransition::Progress => IssueStatus::InProgress,
			IssueTransition::Test => IssueStatus::Testing,
			IssueTransition::Done => IssueStatus::Done,
		}
	}
}
impl Display for IssueTransition {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Sprint an issue is planned into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintRef {
	/// Sprint id.
	#[serde(alias = "sprintId")]
	pub id: Id,
	/// Sprint name, when the payload carried it.
	#[serde(default)]
	pub name: Option<String>,
}

/// User reference embedded in issue payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IssueUser {
	/// User email.
	pub email: String,
	/// Display name.
	#[serde(alias = "name")]
	pub full_name: Option<String>,
}

/// Issue as shown on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IssueWire", rename_all = "camelCase")]
pub struct Issue {
	/// Issue id.
	pub id: Id,
	/// Short summary.
	pub title: String,
	/// Longer description.
	pub description: String,
	/// Category; older issues may have none.
	#[serde(rename = "type")]
	pub issue_type: Option<IssueType>,
	/// Board column.
	pub status: IssueStatus,
	/// Priority, when set.
	pub priority: Option<Priority>,
	/// Assignee email, when assigned.
	pub assignee_email: Option<String>,
	/// Author email.
	pub author_email: Option<String>,
	/// Planned start, as sent by the backend.
	pub start_date: Option<String>,
	/// Planned end, as sent by the backend.
	pub end_date: Option<String>,
	/// Sprint the issue is planned into.
	pub sprint: Option<SprintRef>,
	/// Owning project.
	pub project_id: Option<Id>,
}

/// Every shape the backend uses for an issue.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueWire {
	id: Id,
	#[serde(default)]
	title: String,
	#[serde(default)]
	description: String,
	#[serde(default, rename = "type")]
	issue_type: Option<IssueType>,
	#[serde(default)]
	status: IssueStatus,
	#[serde(default)]
	priority: Option<Priority>,
	#[serde(default)]
	assignee_email: Option<String>,
	#[serde(default)]
	assignee: Option<IssueUser>,
	#[serde(default)]
	author_email: Option<String>,
	#[serde(default)]
	creator: Option<IssueUser>,
	#[serde(default)]
	start_date: Option<String>,
	#[serde(default)]
	end_date: Option<String>,
	#[serde(default)]
	sprint_id: Option<Id>,
	#[serde(default)]
	sprint: Option<SprintRef>,
	#[serde(default)]
	project_id: Option<Id>,
}
impl From<IssueWire> for Issue {
	fn from(wire: IssueWire) -> Self {
		let sprint = wire.sprint.or(wire.sprint_id.map(|id| SprintRef { id, name: None }));
		let assignee_email = non_blank(
			wire.assignee_email.as_deref().or(wire.assignee.as_ref().map(|u| u.email.as_str())),
		);
		let author_email = non_blank(
			wire.author_email.as_deref().or(wire.creator.as_ref().map(|u| u.email.as_str())),
		);

		Self {
			id: wire.id,
			title: wire.title,
			description: wire.description,
			issue_type: wire.issue_type,
			status: wire.status,
			priority: wire.priority,
			assignee_email,
			author_email,
			start_date: wire.start_date,
			end_date: wire.end_date,
			sprint,
			project_id: wire.project_id,
		}
	}
}

/// Body of an issue creation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
	/// Short summary.
	pub title: String,
	/// Longer description.
	pub description: String,
	/// Category.
	#[serde(rename = "type")]
	pub issue_type: IssueType,
	/// Priority.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub priority: Option<Priority>,
	/// Assignee email.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub assignee_email: Option<String>,
	/// Planned start.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub start_date: Option<String>,
	/// Planned end.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub end_date: Option<String>,
	/// Sprint to plan the issue into.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sprint_id: Option<Id>,
}

/// Body of an issue update call.
///
/// Sent through [`UpdateIssueRequest::sanitized`]: text is trimmed and optional text fields
/// that end up empty are omitted instead of clearing the value on the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueRequest {
	/// Short summary; required.
	pub title: String,
	/// Longer description; required.
	pub description: String,
	/// Category.
	#[serde(rename = "type")]
	pub issue_type: IssueType,
	/// Board column.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<IssueStatus>,
	/// Priority.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub priority: Option<Priority>,
	/// Assignee email.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub assignee_email: Option<String>,
	/// Planned start.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub start_date: Option<String>,
	/// Planned end.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub end_date: Option<String>,
	/// Sprint to plan the issue into.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sprint_id: Option<Id>,
}
impl UpdateIssueRequest {
	/// Returns the trimmed body, or the first required field that is empty.
	pub fn sanitized(&self) -> Result<Self, ValidationError> {
		let title = non_blank(Some(self.title.as_str()))
			.ok_or(ValidationError::MissingField { field: "title" })?;
		let description = non_blank(Some(self.description.as_str()))
			.ok_or(ValidationError::MissingField { field: "description" })?;

		Ok(Self {
			title,
			description,
			issue_type: self.issue_type,
			status: self.status,
			priority: self.priority,
			assignee_email: non_blank(self.assignee_email.as_deref()),
			start_date: non_blank(self.start_date.as_deref()),
			end_date: non_blank(self.end_date.as_deref()),
			sprint_id: self.sprint_id,
		})
	}
}

/// Filters for issue search; unset fields do not constrain the result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIssuesRequest {
	/// Board column.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<IssueStatus>,
	/// Assignee email.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub assignee_email: Option<String>,
	/// Sprint id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sprint_id: Option<Id>,
}

/// One recorded change to an issue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IssueHistory {
	/// Entry id.
	pub id: Id,
	/// Changed issue.
	pub issue_id: Id,
	/// Author of the change.
	pub changed_by: Option<IssueUser>,
	/// Change kind, e.g. `STATUS_CHANGE`.
	pub change_type: String,
	/// Value before the change.
	pub old_value: Option<String>,
	/// Value after the change.
	pub new_value: Option<String>,
	/// When the change happened, as sent by the backend.
	pub change_date: Option<String>,
	/// Human-readable summary.
	pub description: Option<String>,
}

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Lists every issue of a project.
	pub async fn list_issues(&self, project_id: Id) -> Result<Vec<Issue>> {
		let request = ApiRequest::get(self.descriptor.project_issues(&project_id.to_string()));

		self.call_json(request, "Failed to load issues").await
	}

	/// Creates an issue in a project.
	pub async fn create_issue(&self, project_id: Id, request: &CreateIssueRequest) -> Result<()> {
		let request = ApiRequest::post(self.descriptor.project_issues(&project_id.to_string()))
			.json(request)?;

		self.call(request, "Failed to create issue").await.map(drop)
	}

	/// Updates an issue after trimming its fields.
	pub async fn update_issue(
		&self,
		project_id: Id,
		issue_id: Id,
		request: &UpdateIssueRequest,
	) -> Result<()> {
		const FALLBACK: &str = "Failed to update issue";

		let body = request.sanitized()?;
		let request = ApiRequest::put(
			self.descriptor.issue(&project_id.to_string(), &issue_id.to_string()),
		)
		.json(&body)?;

		match self.call(request, FALLBACK).await {
			Ok(_) => Ok(()),
			Err(Error::Api { status: 404, message })
				if message == FALLBACK || message == "HTTP 404" =>
				Err(Error::Api {
					status: 404,
					message: format!("Issue {issue_id} was not found in project {project_id}."),
				}),
			Err(e) => Err(e),
		}
	}

	/// Deletes an issue.
	pub async fn delete_issue(&self, project_id: Id, issue_id: Id) -> Result<()> {
		let url = self.descriptor.issue(&project_id.to_string(), &issue_id.to_string());

		self.call(ApiRequest::delete(url), "Failed to delete issue").await.map(drop)
	}

	/// Searches a project's issues.
	pub async fn search_issues(
		&self,
		project_id: Id,
		filters: &SearchIssuesRequest,
	) -> Result<Vec<Issue>> {
		let request = ApiRequest::post(self.descriptor.issue_search(&project_id.to_string()))
			.json(filters)?;

		self.call_json(request, "Failed to search issues").await
	}

	/// Lists the issues planned into a sprint.
	pub async fn list_sprint_issues(&self, project_id: Id, sprint_id: Id) -> Result<Vec<Issue>> {
		let request = ApiRequest::get(
			self.descriptor.sprint_issues(&project_id.to_string(), &sprint_id.to_string()),
		);

		self.call_json(request, "Failed to load sprint issues").await
	}

	/// Returns the change log of an issue.
	pub async fn issue_history(&self, project_id: Id, issue_id: Id) -> Result<Vec<IssueHistory>> {
		let request = ApiRequest::get(
			self.descriptor.issue_history(&project_id.to_string(), &issue_id.to_string()),
		);

		self.call_json(request, "Failed to load issue history").await
	}

	/// Moves an issue to another board column.
	pub async fn transition_issue(
		&self,
		project_id: Id,
		issue_id: Id,
		transition: IssueTransition,
	) -> Result<()> {
		let request = ApiRequest::put(self.descriptor.issue_transition(
			&project_id.to_string(),
			&issue_id.to_string(),
			transition.as_str(),
		));

		self.call(request, "Failed to change issue status").await.map(drop)
	}
}
